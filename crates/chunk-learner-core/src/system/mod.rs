//! # System Module
//!
//! Progress metrics derived from the scheduler's view of the store.
//!
//! Everything here is informational: nothing gates on these numbers.

mod progress;

pub use progress::*;
