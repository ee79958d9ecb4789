use thiserror::Error;

/// Errors reported by a bottom search.
///
/// All variants are local, recoverable conditions. The search is pure and
/// deterministic, so retrying the same input returns the same error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BottomError {
    /// The batch holds more samples than the configured capacity.
    #[error("batch of {len} samples exceeds capacity {capacity}")]
    InvalidLength { len: usize, capacity: usize },

    /// The batch is empty, or none of its samples is comparable (all NaN).
    #[error("no bottom found: batch is empty or every sample is NaN")]
    NotFound,

    /// A capacity that is zero, not a multiple of the widest lane count, or
    /// too large for 32-bit lane indices.
    #[error("capacity {capacity} must be a non-zero multiple of {lanes} no larger than i32::MAX")]
    InvalidCapacity { capacity: usize, lanes: usize },

    /// A caller-supplied scratch buffer does not match the searcher's capacity.
    #[error("scratch buffer holds {actual} slots, searcher expects {expected}")]
    ScratchMismatch { expected: usize, actual: usize },
}
