//! # Primitives
//!
//! Hardcoded runtime constants for the chunk-learner core.
//!
//! These are compiled into the binary and are immutable at runtime.

/// Lowest allowed difficulty rating.
pub const MIN_DIFFICULTY: u8 = 1;

/// Highest allowed difficulty rating.
pub const MAX_DIFFICULTY: u8 = 5;

/// First identifier handed out by an empty store.
pub const FIRST_CHUNK_ID: u64 = 1;

/// Current on-disk schema version.
///
/// Increment this when making breaking changes to the row encoding.
/// A database stamped with any other version is rejected on open.
pub const SCHEMA_VERSION: u64 = 1;

/// Current export snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for chunk names, in bytes.
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum length for chunk descriptions (64KB).
pub const MAX_DESCRIPTION_LENGTH: usize = 65536;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_range_is_one_to_five() {
        assert_eq!((MIN_DIFFICULTY, MAX_DIFFICULTY), (1, 5));
    }

    #[test]
    fn ids_start_at_one() {
        assert_eq!(FIRST_CHUNK_ID, 1);
    }
}
