//! Real-time partitioned convolution engine: a low-latency uniform-partition
//! head (`upc`) paired with a time-distributed FFT tail (`tdc`), orchestrated
//! by `manager`. See each submodule for the grounding of its algorithm.

pub mod error;
pub mod fft;
pub mod manager;
pub mod sample;
pub mod tdc;
pub mod upc;
pub mod util;

pub use error::ConvolutionError;
pub use manager::{ConvolutionManager, StereoConvolutionManager, DEFAULT_BLOCK_SIZE, DEFAULT_HEAD_PARTITIONS};
pub use sample::Sample;
