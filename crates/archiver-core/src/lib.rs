//! Core domain models and logic for archiver
//!
//! This crate contains:
//! - Domain models (Container, ListedItem, AccessTier)
//! - The storage backend capability the walker depends on
//! - The archiver walker and its operator-facing progress log

pub mod backend;
pub mod error;
pub mod item;
pub mod memory;
pub mod progress;
pub mod tier;
pub mod walker;

pub use backend::{BackendError, ContainerStream, ItemStream, StorageBackend};
pub use error::{Error, Result};
pub use item::{BlobItem, Container, Directory, ListScope, ListedItem, UnknownItem};
pub use memory::MemoryBackend;
pub use progress::ProgressLog;
pub use tier::{AccessTier, ParseTierError};
pub use walker::{Archiver, RunSummary, TieringPolicy, run};
