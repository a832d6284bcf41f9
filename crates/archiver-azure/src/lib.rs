//! Azure Blob Storage backend for archiver
//!
//! This crate provides:
//! - Connection string parsing (Shared Key, SAS, local emulator)
//! - A tuned HTTP client with a bounded exponential retry policy
//! - The `StorageBackend` implementation over the Blob REST API

mod backend;
pub mod client;
pub mod connection;
pub mod error;
mod model;
pub mod retry;
mod signing;

pub use client::{BlobServiceClient, ClientOptions, TransportOptions};
pub use connection::{ConnectionString, Credential};
pub use error::{ClientError, Result};
pub use retry::RetryPolicy;
