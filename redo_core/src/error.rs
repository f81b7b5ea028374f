use thiserror::Error;

/// Why [`crate::Session::begin`] rejected its arguments.
///
/// The public constructor still returns `Option<Session>`, per the
/// library's contract that invalid-argument and out-of-memory failures
/// never surface as panics or as a widened return type. This type exists
/// so the rejection reason can be logged before being discarded.
#[derive(Debug, Error)]
pub(crate) enum BeginError {
    #[error("state size must be at least 1 byte, got {0}")]
    StateSizeZero(usize),
    #[error("compare size {compare_size} exceeds state size {state_size}")]
    CompareSizeTooLarge { compare_size: usize, state_size: usize },
    #[error("initial state buffer has {actual} bytes, expected {expected}")]
    InitialStateWrongLength { expected: usize, actual: usize },
    #[error("padded position slot size would exceed the 16-bit contract bound")]
    SlotSizeOverflow,
    #[error("arena allocation failed while creating the root position")]
    OutOfMemory,
}
