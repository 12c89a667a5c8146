//! Data models for the upload service.
//!
//! Nothing here is persisted: file records are derived live from the storage
//! root and serialize naturally as JSON via `serde`.

pub mod file;
