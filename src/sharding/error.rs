//! Error type for sharded entity delivery.

// Layer 2: Third-party crate imports
use thiserror::Error;

/// Failure modes for [`crate::sharding::ShardRegion::deliver`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShardingError {
    /// The entity's startup buffer was full and the region's overflow
    /// policy is `DeadLetter` rather than `DropOldest` (spec.md §4.8
    /// "overflow drops-oldest or dead-letters per policy").
    #[error("entity {entity_id:?}'s startup buffer overflowed")]
    BufferOverflow {
        /// The entity id whose buffer overflowed.
        entity_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_overflow_display() {
        let err = ShardingError::BufferOverflow {
            entity_id: "cart-42".to_string(),
        };
        assert!(err.to_string().contains("overflowed"));
    }
}
