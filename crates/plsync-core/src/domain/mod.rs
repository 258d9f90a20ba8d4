//! Domain entities and business logic
//!
//! This module contains the core domain types for plsync:
//! - Newtypes for track paths, catalog identifiers and configured pairs
//! - The playlist document tree and its accessors
//! - Scan-state reduction over the catalog's scheduled tasks
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod playlist;
pub mod scan;

// Re-export commonly used types
pub use errors::{DocumentError, DomainError};
pub use newtypes::*;
pub use playlist::{PlaylistDocument, XmlElement, XmlNode};
pub use scan::{ScanReading, ScanState, DEFAULT_FREEZE_THRESHOLD};
