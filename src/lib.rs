//! Minimal HTTP service for uploading, listing and downloading files kept in
//! a single local directory.

pub mod config;
pub mod errors;
pub mod filename;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
