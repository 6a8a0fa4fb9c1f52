use num_traits::{Float, FloatConst};
use rustfft::FftNum;

/// A real, floating-point audio sample usable throughout the convolution core.
///
/// `FftNum` gives us `Copy + Send + Sync + 'static` plus the numeric traits
/// `rustfft`'s `Complex<T>` needs; `Float` adds the trigonometric functions
/// and `FloatConst` the `PI()` constant the twiddle-factor computation in
/// [`crate::convolution::fft`] requires. Both `f32` and `f64` satisfy this
/// automatically.
pub trait Sample: FftNum + Float + FloatConst {}

impl<T> Sample for T where T: FftNum + Float + FloatConst {}
