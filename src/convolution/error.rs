use thiserror::Error;

/// Failure modes reported at construction or reconfiguration time.
///
/// Nothing on the audio path (`process_input`) returns this: contention with
/// an in-progress reload is handled by silencing the block, not by an error
/// (see the crate-level docs on the try-lock exclusion primitive).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConvolutionError {
    #[error("block size {block_size} is not a power of two")]
    InvalidBlockSize { block_size: usize },

    #[error("failed to allocate {requested} elements for a convolver buffer")]
    AllocationFailure { requested: usize },
}
