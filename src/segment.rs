//! Segment name validation
//!
//! A segment maps 1:1 to a MongoDB collection, so its name has to satisfy the
//! collection naming rules of the server:
//!
//! - empty string is not valid
//! - cannot contain `\0`
//! - the `system.` prefix is reserved
//! - user created collections should not contain `$`
//! - database name + collection name < 100 bytes (the server allows 120)

use thiserror::Error;

/// Reserved collection name prefix
pub const RESERVED_PREFIX: &str = "system.";

/// Upper bound (exclusive) on segment + partition length, in bytes
pub const MAX_NAMESPACE_LENGTH: usize = 100;

/// Reason a segment name was rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentNameError {
    #[error("Empty string")]
    Empty,

    #[error("Includes null character")]
    NullCharacter,

    #[error("Begins with \"system.\"")]
    ReservedPrefix,

    #[error("Contains \"$\"")]
    ReservedCharacter,

    #[error("Segment and partition name lengths exceeds 100 characters")]
    TooLong,
}

/// Check `name` against the collection naming rules for `partition`
///
/// Checks run in a fixed order and the first failing rule is reported.
pub fn validate_segment_name(name: &str, partition: &str) -> Result<(), SegmentNameError> {
    if name.is_empty() {
        return Err(SegmentNameError::Empty);
    }

    if name.contains('\0') {
        return Err(SegmentNameError::NullCharacter);
    }

    if name.starts_with(RESERVED_PREFIX) {
        return Err(SegmentNameError::ReservedPrefix);
    }

    if name.contains('$') {
        return Err(SegmentNameError::ReservedCharacter);
    }

    if name.len() + partition.len() >= MAX_NAMESPACE_LENGTH {
        return Err(SegmentNameError::TooLong);
    }

    Ok(())
}
