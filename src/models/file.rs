//! Represents a file held in the storage root.

use serde::{Deserialize, Serialize};

/// A single uploaded file, as seen on disk.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    /// Sanitized filename, relative to the storage root.
    pub name: String,

    /// Size in bytes.
    pub size: u64,
}

/// Body of `GET /files`.
#[derive(Serialize, Deserialize, Debug)]
pub struct FileList {
    pub files: Vec<FileRecord>,
}

/// Body of a successful `POST /upload`.
#[derive(Serialize, Deserialize, Debug)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub size: u64,
}

impl From<FileRecord> for UploadResponse {
    fn from(record: FileRecord) -> Self {
        Self {
            message: "File uploaded successfully".into(),
            filename: record.name,
            size: record.size,
        }
    }
}
