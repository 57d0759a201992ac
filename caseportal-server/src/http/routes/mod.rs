//! Route handlers organized by resource

pub mod admin;
pub mod attachments;
pub mod auth;
pub mod cases;
pub mod comments;
pub mod health;
pub mod live;
pub mod messages;
pub mod storage;
