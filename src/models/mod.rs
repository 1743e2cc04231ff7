//! Core data models for the image compression service.
//!
//! Formats, compression jobs and the JSON bodies returned to clients.
//! They serialize naturally as JSON via `serde`.

pub mod compression;
pub mod image;
