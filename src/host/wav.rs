//! WAV impulse-response loading for the demonstration binary. Grounded in
//! `ir::loader::IrLoader::load_ir`, adapted to return a plain normalized mono
//! `Vec<f32>` ready for `ConvolutionManager::new`/`set_impulse_response`
//! instead of a cabinet-specific handle, and to resample via `rubato`
//! (already used elsewhere in the ambient stack for realtime oversampling)
//! rather than a hand-rolled linear interpolator.

use anyhow::{Context, Result};
use hound::WavReader;
use log::debug;
use rubato::{FftFixedIn, Resampler};
use std::path::Path;

use crate::convolution::util::normalize_mono;

/// Loads a WAV file as a mono `f32` impulse response, resampled to
/// `target_sample_rate` if necessary and normalized so `Σ|ir[i]| == 20.0`
/// (the same normalization contract `ConvolutionManager` expects of any
/// impulse response it is handed).
pub fn load_ir(path: &Path, target_sample_rate: u32) -> Result<Vec<f32>> {
    let reader = WavReader::open(path).context("failed to open WAV file")?;
    let spec = reader.spec();

    let samples: Vec<f32> = if spec.sample_format == hound::SampleFormat::Float {
        reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read float samples")?
    } else {
        let max_val = (1i32 << (spec.bits_per_sample - 1)) as f32;
        reader
            .into_samples::<i32>()
            .map(|s| s.map(|v| v as f32 / max_val))
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read integer samples")?
    };

    let mono: Vec<f32> = if spec.channels > 1 {
        samples
            .chunks(spec.channels as usize)
            .map(|c| c.iter().sum::<f32>() / spec.channels as f32)
            .collect()
    } else {
        samples
    };

    let mut ir = if spec.sample_rate != target_sample_rate {
        debug!(
            "resampling impulse response from {} Hz to {} Hz",
            spec.sample_rate, target_sample_rate
        );
        resample_offline(&mono, spec.sample_rate, target_sample_rate)
            .context("failed to resample impulse response")?
    } else {
        mono
    };

    normalize_mono(&mut ir, 20.0);
    Ok(ir)
}

/// Resamples a full, non-realtime buffer by feeding it through `rubato` in
/// fixed-size chunks, zero-padding the final partial chunk.
fn resample_offline(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    const CHUNK: usize = 4096;

    let mut resampler = FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, CHUNK, 2, 1)
        .context("failed to build resampler")?;

    let mut output = Vec::with_capacity((samples.len() as u64 * to_rate as u64 / from_rate.max(1) as u64) as usize);
    let mut offset = 0;

    while offset < samples.len() {
        let end = (offset + CHUNK).min(samples.len());
        let mut chunk = vec![0.0f32; CHUNK];
        chunk[..end - offset].copy_from_slice(&samples[offset..end]);

        let input = vec![chunk];
        let produced = resampler
            .process(&input, None)
            .context("resampler chunk failed")?;
        output.extend_from_slice(&produced[0]);

        offset = end;
    }

    Ok(output)
}
