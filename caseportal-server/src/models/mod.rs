//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod validation;
pub mod account;
pub mod attachment;
pub mod case;
pub mod message;
pub mod policy;
pub mod role;

pub use validation::ValidationError;
pub use account::{Email, FullName, Password};
pub use attachment::{
    partition_batch, AttachmentUpload, CappedBuffer, FileRejection, IncomingFile, ALLOWED_MIME_TYPES,
    MAX_ATTACHMENT_BYTES,
};
pub use case::{CaseDescription, CaseFieldUpdate, CasePriority, CaseStatus, CaseTitle};
pub use message::{ChatContent, CommentBody};
pub use policy::StatusPolicy;
pub use role::{RoleSet, RoleState, ADMIN_ROLE, CLIENT_ROLE};
