//! Radix-2, decimation-in-time, in-place complex FFT/IFFT.
//!
//! Translated from the original source's `util/fft.hpp` (itself adapted from
//! Stephen Smith's DSP Guide algorithm), with the real/imaginary parallel
//! arrays folded into a single `Complex<S>` buffer (see `SPEC_FULL.md` §9.2).
//! No allocation, no error return: callers guarantee `buf.len()` is a power
//! of two.

use num_traits::NumCast;
use rustfft::num_complex::Complex;

use crate::convolution::sample::Sample;

/// Forward FFT, in place. `buf.len()` must be a power of two `>= 2`.
pub fn fft<S: Sample>(buf: &mut [Complex<S>]) {
    let n = buf.len();
    debug_assert!(n >= 2 && n.is_power_of_two());

    bit_reverse_permute(buf);

    let mut stage_len = 2usize;
    while stage_len <= n {
        let half = stage_len / 2;
        let angle_step = -S::from(2.0).unwrap() * S::PI() / S::from(stage_len).unwrap();
        for block_start in (0..n).step_by(stage_len) {
            let mut twiddle = Complex::new(S::one(), S::zero());
            let step = Complex::new(angle_step.cos(), angle_step.sin());
            for k in 0..half {
                let top = buf[block_start + k];
                let bot = buf[block_start + k + half] * twiddle;
                buf[block_start + k] = top + bot;
                buf[block_start + k + half] = top - bot;
                twiddle = twiddle * step;
            }
        }
        stage_len <<= 1;
    }
}

/// Inverse FFT, in place: conjugate, forward-transform, conjugate, scale by
/// `1/N` — exactly the formulation the original source uses, so that `fft`
/// and `ifft` compose to the identity (property P1).
pub fn ifft<S: Sample>(buf: &mut [Complex<S>]) {
    let n = buf.len();
    debug_assert!(n >= 2 && n.is_power_of_two());

    for c in buf.iter_mut() {
        *c = c.conj();
    }
    fft(buf);
    let scale = S::one() / S::from(n).unwrap();
    for c in buf.iter_mut() {
        *c = c.conj() * scale;
    }
}

fn bit_reverse_permute<S: Sample>(buf: &mut [Complex<S>]) {
    let n = buf.len();
    let bits = n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> (usize::BITS - bits);
        if j > i {
            buf.swap(i, j);
        }
    }
}
