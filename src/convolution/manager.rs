//! Top-level engine: a head/tail pair (`UpConvolver` + optional `TdConvolver`)
//! behind a try-lock so the audio thread never blocks on an in-progress IR
//! reload. Grounded in the teacher's `audio::engine::Engine` in its overall
//! shape (one struct the realtime callback drives, one handle a control
//! thread drives), adapted here to a single type since both roles share the
//! exact same lock.

use std::sync::Mutex;

use log::warn;

use crate::convolution::error::ConvolutionError;
use crate::convolution::sample::Sample;
use crate::convolution::tdc::TdConvolver;
use crate::convolution::upc::UpConvolver;
use crate::convolution::util::gen_dirac;

/// Number of block-sized partitions the head (UPC) branch carries before the
/// tail (TDC) branch takes over, i.e. `H = DEFAULT_HEAD_PARTITIONS * block_size`.
pub const DEFAULT_HEAD_PARTITIONS: usize = 8;

pub const DEFAULT_BLOCK_SIZE: usize = 128;

struct EngineState<S: Sample> {
    block_size: usize,
    head_partitions: usize,
    ir: Vec<S>,
    upc: UpConvolver<S>,
    tdc: Option<TdConvolver<S>>,
    out: Vec<S>,
}

impl<S: Sample> EngineState<S> {
    fn new(ir: &[S], block_size: usize, head_partitions: usize) -> Result<Self, ConvolutionError> {
        let head_len = (head_partitions * block_size).min(ir.len());
        let upc = UpConvolver::new(&ir[..head_len], block_size, head_partitions)?;
        let tdc = if ir.len() > head_len {
            Some(TdConvolver::new(&ir[head_len..], block_size)?)
        } else {
            None
        };

        Ok(Self {
            block_size,
            head_partitions,
            ir: ir.to_vec(),
            upc,
            tdc,
            out: vec![S::zero(); block_size],
        })
    }

    fn process_input(&mut self, input: &[S]) {
        self.upc.process_input(input);
        if let Some(tdc) = self.tdc.as_mut() {
            tdc.process_input(input);
            let head = self.upc.output_buffer();
            let tail = tdc.output_buffer();
            for i in 0..self.block_size {
                self.out[i] = head[i] + tail[i];
            }
        } else {
            self.out.copy_from_slice(self.upc.output_buffer());
        }
    }
}

/// Single-channel convolution engine: owns a head/tail convolver pair behind
/// a try-lock. Safe to share between a realtime audio thread and a
/// non-realtime reconfiguration thread via `Arc<ConvolutionManager<S>>`.
pub struct ConvolutionManager<S: Sample> {
    state: Mutex<EngineState<S>>,
}

impl<S: Sample> ConvolutionManager<S> {
    /// Builds an engine over `ir` with the given block size and
    /// `DEFAULT_HEAD_PARTITIONS` UPC partitions. Pass `None` for `ir` to get
    /// the default Dirac impulse (identity convolution).
    pub fn new(ir: Option<&[S]>, block_size: Option<usize>) -> Result<Self, ConvolutionError> {
        Self::with_head_partitions(ir, block_size, DEFAULT_HEAD_PARTITIONS)
    }

    /// As [`Self::new`], but with an explicit UPC head-partition count (e.g.
    /// from [`crate::config::EngineSettings::max_head_partitions`]) instead
    /// of `DEFAULT_HEAD_PARTITIONS`.
    pub fn with_head_partitions(
        ir: Option<&[S]>,
        block_size: Option<usize>,
        head_partitions: usize,
    ) -> Result<Self, ConvolutionError> {
        let block_size = block_size.unwrap_or(DEFAULT_BLOCK_SIZE);
        let owned_dirac;
        let ir = match ir {
            Some(ir) => ir,
            None => {
                let mut dirac = vec![S::zero(); DEFAULT_BLOCK_SIZE];
                gen_dirac(&mut dirac);
                owned_dirac = dirac;
                &owned_dirac
            }
        };

        Ok(Self {
            state: Mutex::new(EngineState::new(ir, block_size, head_partitions)?),
        })
    }

    /// Advances the engine by one block. On lock contention with an
    /// in-progress reload, `output` is filled with silence and the call
    /// returns immediately — the audio thread never blocks.
    pub fn process_input(&self, input: &[S], output: &mut [S]) {
        match self.state.try_lock() {
            Ok(mut state) => {
                state.process_input(input);
                output.copy_from_slice(&state.out);
            }
            Err(_) => {
                warn!("convolution engine busy reloading; emitting silence for this block");
                for s in output.iter_mut() {
                    *s = S::zero();
                }
            }
        }
    }

    /// Convenience accessor for non-realtime callers: re-acquires the lock
    /// (blocking) and returns a copy of the last produced block.
    pub fn output_buffer(&self) -> Vec<S> {
        self.state.lock().unwrap().out.clone()
    }

    /// Replaces the impulse response, rebuilding the head/tail engines from
    /// scratch. Blocks until the audio thread is not mid-block; acceptable
    /// since this runs on a non-realtime loader thread.
    pub fn set_impulse_response(&self, ir: &[S]) -> Result<(), ConvolutionError> {
        let mut guard = self.state.lock().unwrap();
        let block_size = guard.block_size;
        let head_partitions = guard.head_partitions;
        *guard = EngineState::new(ir, block_size, head_partitions)?;
        Ok(())
    }

    /// Rebuilds the engine at a new block size, clearing all histories.
    pub fn set_block_size(&self, block_size: usize) -> Result<(), ConvolutionError> {
        let mut guard = self.state.lock().unwrap();
        let head_partitions = guard.head_partitions;
        let ir = std::mem::take(&mut guard.ir);
        *guard = EngineState::new(&ir, block_size, head_partitions)?;
        Ok(())
    }

    pub fn block_size(&self) -> usize {
        self.state.lock().unwrap().block_size
    }
}

struct StereoState<S: Sample> {
    left: EngineState<S>,
    right: EngineState<S>,
}

/// Dual-channel orchestration: left and right channels share a single
/// exclusion primitive, so a reload swaps both channels atomically with
/// respect to the audio thread (no block is ever rendered with one channel
/// on the old IR and the other on the new one).
pub struct StereoConvolutionManager<S: Sample> {
    state: Mutex<StereoState<S>>,
}

impl<S: Sample> StereoConvolutionManager<S> {
    /// Builds a stereo engine with `DEFAULT_HEAD_PARTITIONS` UPC partitions
    /// per channel. See [`Self::with_head_partitions`] for an explicit count.
    pub fn new(
        ir_left: Option<&[S]>,
        ir_right: Option<&[S]>,
        block_size: Option<usize>,
    ) -> Result<Self, ConvolutionError> {
        Self::with_head_partitions(ir_left, ir_right, block_size, DEFAULT_HEAD_PARTITIONS)
    }

    pub fn with_head_partitions(
        ir_left: Option<&[S]>,
        ir_right: Option<&[S]>,
        block_size: Option<usize>,
        head_partitions: usize,
    ) -> Result<Self, ConvolutionError> {
        let block_size = block_size.unwrap_or(DEFAULT_BLOCK_SIZE);

        let owned_dirac;
        let dirac_ir: &[S] = {
            let mut dirac = vec![S::zero(); DEFAULT_BLOCK_SIZE];
            gen_dirac(&mut dirac);
            owned_dirac = dirac;
            &owned_dirac
        };

        let left = EngineState::new(ir_left.unwrap_or(dirac_ir), block_size, head_partitions)?;
        let right = EngineState::new(
            ir_right.unwrap_or(ir_left.unwrap_or(dirac_ir)),
            block_size,
            head_partitions,
        )?;

        Ok(Self {
            state: Mutex::new(StereoState { left, right }),
        })
    }

    pub fn process_input(
        &self,
        input_left: &[S],
        input_right: &[S],
        output_left: &mut [S],
        output_right: &mut [S],
    ) {
        match self.state.try_lock() {
            Ok(mut state) => {
                state.left.process_input(input_left);
                state.right.process_input(input_right);
                output_left.copy_from_slice(&state.left.out);
                output_right.copy_from_slice(&state.right.out);
            }
            Err(_) => {
                warn!("stereo convolution engine busy reloading; emitting silence for this block");
                for s in output_left.iter_mut() {
                    *s = S::zero();
                }
                for s in output_right.iter_mut() {
                    *s = S::zero();
                }
            }
        }
    }

    /// Replaces both channels' impulse responses atomically.
    pub fn set_impulse_response(&self, ir_left: &[S], ir_right: &[S]) -> Result<(), ConvolutionError> {
        let mut guard = self.state.lock().unwrap();
        let block_size = guard.left.block_size;
        let head_partitions = guard.left.head_partitions;
        let left = EngineState::new(ir_left, block_size, head_partitions)?;
        let right = EngineState::new(ir_right, block_size, head_partitions)?;
        guard.left = left;
        guard.right = right;
        Ok(())
    }

    pub fn set_block_size(&self, block_size: usize) -> Result<(), ConvolutionError> {
        let mut guard = self.state.lock().unwrap();
        let head_partitions = guard.left.head_partitions;
        let left_ir = std::mem::take(&mut guard.left.ir);
        let right_ir = std::mem::take(&mut guard.right.ir);
        guard.left = EngineState::new(&left_ir, block_size, head_partitions)?;
        guard.right = EngineState::new(&right_ir, block_size, head_partitions)?;
        Ok(())
    }
}
