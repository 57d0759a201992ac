//! Attachment upload validation
//!
//! Every file in a batch is checked on its own before anything is written, so
//! one bad file never blocks its siblings.

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::ValidationError;

/// Maximum attachment size in bytes (10 MiB)
pub const MAX_ATTACHMENT_BYTES: u64 = 10_485_760;

/// MIME types accepted for attachments
pub const ALLOWED_MIME_TYPES: [&str; 9] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "image/jpeg",
    "image/png",
    "image/gif",
    "application/zip",
];

/// Maximum length for stored file names
const MAX_FILE_NAME_LEN: usize = 255;

/// A file as received from a multipart upload, before validation
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// A file that passed size and type checks
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    file_name: String,
    mime_type: String,
    bytes: Bytes,
}

impl AttachmentUpload {
    /// Validate an incoming file.
    ///
    /// # Rules
    /// - Size ≤ 10,485,760 bytes
    /// - MIME type in [`ALLOWED_MIME_TYPES`]
    /// - File name reduced to its last path component, non-empty
    pub fn validate(file: IncomingFile) -> Result<Self, ValidationError> {
        let file_name = sanitize_file_name(&file.file_name)?;

        let size = file.bytes.len() as u64;
        if size > MAX_ATTACHMENT_BYTES {
            return Err(ValidationError::TooLarge {
                file_name,
                size,
                max: MAX_ATTACHMENT_BYTES,
            });
        }

        let mime_type = file.mime_type.trim().to_ascii_lowercase();
        if !is_allowed_mime(&mime_type) {
            return Err(ValidationError::UnsupportedType {
                file_name,
                mime_type: file.mime_type,
            });
        }

        Ok(Self {
            file_name,
            mime_type,
            bytes: file.bytes,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn size(&self) -> i64 {
        self.bytes.len() as i64
    }

    /// Storage key: `{case_id}/{unix_millis}-{file_name}`.
    pub fn storage_path(&self, case_id: Uuid, now: DateTime<Utc>) -> String {
        format!("{}/{}-{}", case_id, now.timestamp_millis(), self.file_name)
    }
}

/// Per-file rejection reported back to the uploader
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRejection {
    pub file_name: String,
    pub reason: String,
}

impl FileRejection {
    /// Rejection for a file whose bytes were discarded once it passed the cap.
    pub fn too_large(file_name: &str, size: u64) -> Self {
        let shown = sanitize_file_name(file_name).unwrap_or_else(|_| file_name.to_owned());
        Self {
            file_name: file_name.to_owned(),
            reason: ValidationError::TooLarge {
                file_name: shown,
                size,
                max: MAX_ATTACHMENT_BYTES,
            }
            .to_string(),
        }
    }
}

/// Accumulates one upload's bytes, keeping nothing once it exceeds `max`.
///
/// The full size is still counted so the rejection can report it.
#[derive(Debug)]
pub struct CappedBuffer {
    max: u64,
    seen: u64,
    buf: BytesMut,
}

impl CappedBuffer {
    pub fn new(max: u64) -> Self {
        Self {
            max,
            seen: 0,
            buf: BytesMut::new(),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.seen += chunk.len() as u64;
        if self.seen <= self.max {
            self.buf.extend_from_slice(chunk);
        } else if !self.buf.is_empty() {
            self.buf = BytesMut::new();
        }
    }

    pub fn exceeded(&self) -> bool {
        self.seen > self.max
    }

    /// The bytes, or the total size seen if the cap was passed.
    pub fn finish(self) -> Result<Bytes, u64> {
        if self.exceeded() {
            Err(self.seen)
        } else {
            Ok(self.buf.freeze())
        }
    }
}

/// Split a batch into accepted uploads and rejections, preserving order.
pub fn partition_batch(files: Vec<IncomingFile>) -> (Vec<AttachmentUpload>, Vec<FileRejection>) {
    let mut accepted = Vec::with_capacity(files.len());
    let mut rejected = Vec::new();

    for file in files {
        let file_name = file.file_name.clone();
        match AttachmentUpload::validate(file) {
            Ok(upload) => accepted.push(upload),
            Err(e) => rejected.push(FileRejection {
                file_name,
                reason: e.to_string(),
            }),
        }
    }

    (accepted, rejected)
}

pub fn is_allowed_mime(mime_type: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime_type)
}

fn sanitize_file_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(ValidationError::InvalidFormat {
            field: "file name",
            reason: "must name a file",
        });
    }

    if name.chars().count() > MAX_FILE_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "file name",
            max: MAX_FILE_NAME_LEN,
        });
    }

    Ok(name.to_owned())
}
