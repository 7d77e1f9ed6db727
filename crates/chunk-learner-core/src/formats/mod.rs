//! # Formats Module
//!
//! Versioned export formats. File I/O stays in the app layer.

mod snapshot;

pub use snapshot::Snapshot;
