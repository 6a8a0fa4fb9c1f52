//! Uniform-Partition FFT Convolver — handles the IR "head" at one block of
//! latency. Grounded in `original_source/Source/UniformPartitionConvolver.hpp`,
//! translated to operate on `Complex<S>` spectra (SPEC_FULL.md §9.2) instead
//! of parallel real/imaginary arrays.

use rustfft::num_complex::Complex;

use crate::convolution::error::ConvolutionError;
use crate::convolution::fft::{fft, ifft};
use crate::convolution::sample::Sample;
use crate::convolution::util::is_power_of_two;

/// Low-latency head convolver: uniform partitioning of the IR into
/// block-sized chunks, each transformed once at construction time.
pub struct UpConvolver<S: Sample> {
    block_size: usize,
    num_partitions: usize,
    ir_partitions: Vec<Vec<Complex<S>>>,
    history: Vec<Vec<Complex<S>>>,
    cursor: usize,
    tail: Vec<S>,
    scratch: Vec<Complex<S>>,
    out: Vec<S>,
}

impl<S: Sample> UpConvolver<S> {
    /// Builds a convolver over `ir`, partitioned into `block_size`-sized
    /// chunks and capped at `max_partitions` partitions (samples beyond
    /// `max_partitions * block_size` are dropped — the Manager is
    /// responsible for handing only the head of the IR to this type).
    pub fn new(
        ir: &[S],
        block_size: usize,
        max_partitions: usize,
    ) -> Result<Self, ConvolutionError> {
        if !is_power_of_two(block_size) {
            return Err(ConvolutionError::InvalidBlockSize { block_size });
        }

        let transform_size = 2 * block_size;
        let wanted_partitions = ir.len().div_ceil(block_size.max(1));
        let num_partitions = wanted_partitions.min(max_partitions);

        let mut ir_partitions = Vec::with_capacity(num_partitions);
        for p in 0..num_partitions {
            let start = p * block_size;
            let end = (start + block_size).min(ir.len());

            let mut partition = vec![Complex::new(S::zero(), S::zero()); transform_size];
            for (dst, &src) in partition.iter_mut().zip(&ir[start..end]) {
                dst.re = src;
            }
            fft(&mut partition);
            ir_partitions.push(partition);
        }

        let history = vec![vec![Complex::new(S::zero(), S::zero()); transform_size]; num_partitions];

        Ok(Self {
            block_size,
            num_partitions,
            ir_partitions,
            history,
            cursor: 0,
            tail: vec![S::zero(); block_size],
            scratch: vec![Complex::new(S::zero(), S::zero()); transform_size],
            out: vec![S::zero(); block_size],
        })
    }

    /// Advances the convolver by one block of `block_size` input samples.
    pub fn process_input(&mut self, block: &[S]) {
        debug_assert_eq!(block.len(), self.block_size);

        if self.num_partitions == 0 {
            self.out.copy_from_slice(block);
            for s in self.out.iter_mut() {
                *s = S::zero();
            }
            return;
        }

        let slot = &mut self.history[self.cursor];
        for c in slot.iter_mut() {
            *c = Complex::new(S::zero(), S::zero());
        }
        for (dst, &src) in slot.iter_mut().zip(block) {
            dst.re = src;
        }
        fft(slot);

        for c in self.scratch.iter_mut() {
            *c = Complex::new(S::zero(), S::zero());
        }
        for j in 0..self.num_partitions {
            let k = crate::convolution::util::step_back(self.cursor, j, self.num_partitions);
            let x = &self.history[k];
            let h = &self.ir_partitions[j];
            for ((acc, &xv), &hv) in self.scratch.iter_mut().zip(x.iter()).zip(h.iter()) {
                *acc += xv * hv;
            }
        }

        ifft(&mut self.scratch);

        for i in 0..self.block_size {
            let value = self.scratch[i].re + self.tail[i];
            self.tail[i] = self.scratch[i + self.block_size].re;
            self.out[i] = value;
        }

        self.cursor = (self.cursor + 1) % self.num_partitions;
    }

    /// The block produced by the most recent `process_input` call.
    pub fn output_buffer(&self) -> &[S] {
        &self.out
    }
}
