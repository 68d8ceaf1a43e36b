//! Sample-rate conversion between a capture and its reference.
//!
//! Uses rubato's sinc resampler when the `high-quality-audio` feature is on
//! and falls back to an FIR low-pass plus linear interpolation otherwise, or
//! when rubato rejects the request.

#[cfg(feature = "high-quality-audio")]
use anyhow::{anyhow, Result};
#[cfg(feature = "high-quality-audio")]
use rubato::{InterpolationParameters, InterpolationType, Resampler, SincFixedIn, WindowFunction};
use std::cmp::Ordering as CmpOrdering;
use std::f32::consts::PI;
#[cfg(feature = "high-quality-audio")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "high-quality-audio")]
use tracing::warn;

pub(crate) const MIN_RATE: u32 = 2_000;
pub(crate) const MAX_RATE: u32 = 1_600_000;
pub(crate) const MIN_RESAMPLE_RATIO: f64 = 0.01;
pub(crate) const MAX_RESAMPLE_RATIO: f64 = 8.0;
const MAX_DOWNSAMPLING_TAPS: usize = 129;

#[cfg(feature = "high-quality-audio")]
static RESAMPLER_WARNING_SHOWN: AtomicBool = AtomicBool::new(false);

/// Output length after converting `len` samples from `from_rate` to `to_rate`.
pub(crate) fn scaled_len(len: usize, from_rate: u32, to_rate: u32) -> usize {
    if from_rate == 0 {
        return len;
    }
    ((len as f64) * f64::from(to_rate) / f64::from(from_rate)).round() as usize
}

fn rates_supported(from_rate: u32, to_rate: u32) -> bool {
    if !(MIN_RATE..=MAX_RATE).contains(&from_rate) || !(MIN_RATE..=MAX_RATE).contains(&to_rate) {
        return false;
    }
    let ratio = f64::from(to_rate) / f64::from(from_rate);
    (MIN_RESAMPLE_RATIO..=MAX_RESAMPLE_RATIO).contains(&ratio)
}

/// Resample `input` so it plays at `to_rate`; the length scales by the rate ratio.
pub fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return input.to_vec();
    }

    #[cfg(feature = "high-quality-audio")]
    {
        match resample_with_rubato(input, from_rate, to_rate) {
            Ok(output) => output,
            Err(err) => {
                if !RESAMPLER_WARNING_SHOWN.swap(true, Ordering::AcqRel) {
                    warn!("high-quality resampler failed ({err}); falling back to basic path");
                }
                basic_resample(input, from_rate, to_rate)
            }
        }
    }

    #[cfg(not(feature = "high-quality-audio"))]
    {
        basic_resample(input, from_rate, to_rate)
    }
}

#[cfg(feature = "high-quality-audio")]
pub(crate) fn resample_with_rubato(input: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if input.is_empty() || from_rate == to_rate {
        return Ok(input.to_vec());
    }
    if !rates_supported(from_rate, to_rate) {
        return Err(anyhow!(
            "unsupported sample rate conversion {from_rate}Hz -> {to_rate}Hz"
        ));
    }
    let ratio = f64::from(to_rate) / f64::from(from_rate);

    let chunk = 256usize;
    let params = InterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.92,
        interpolation: InterpolationType::Cubic,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut rs = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk, 1)
        .map_err(|e| anyhow!("failed to construct sinc resampler: {e:?}"))?;

    let expect = scaled_len(input.len(), from_rate, to_rate).max(1);
    let mut out = Vec::with_capacity(expect + chunk);

    let mut idx = 0usize;
    let mut seg = vec![0.0f32; chunk];
    while idx < input.len() {
        let end = (idx + chunk).min(input.len());
        let len = end - idx;
        seg.fill(0.0);
        seg[..len].copy_from_slice(&input[idx..end]);
        let produced = rs
            .process(std::slice::from_ref(&seg), None)
            .map_err(|e| anyhow!("resampler process failed: {e:?}"))?;
        out.extend_from_slice(&produced[0]);
        idx = end;
    }

    Ok(adjust_length(out, expect))
}

/// FIR low-pass (when decimating) followed by linear interpolation.
pub(crate) fn basic_resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == 0 || to_rate == 0 {
        return input.to_vec();
    }
    if !rates_supported(from_rate, to_rate) {
        return input.to_vec();
    }

    let ratio = to_rate as f32 / from_rate as f32;
    let filtered = if from_rate > to_rate {
        let taps = downsampling_tap_count(from_rate, to_rate);
        low_pass_fir(input, from_rate, to_rate, taps)
    } else {
        input.to_vec()
    };
    let expect = scaled_len(input.len(), from_rate, to_rate);
    adjust_length(resample_linear(&filtered, ratio), expect)
}

pub(crate) fn resample_linear(input: &[f32], ratio: f32) -> Vec<f32> {
    let input_len = input.len();
    let output_len = (input_len as f32 * ratio).round() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = i as f32 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = src_idx - idx as f32;

        if idx + 1 < input_len {
            output.push(input[idx] * (1.0 - frac) + input[idx + 1] * frac);
        } else {
            output.push(input.last().copied().unwrap_or(0.0));
        }
    }

    output
}

/// Longer filters for steeper decimation, short ones for near-equal rates.
pub(crate) fn downsampling_tap_count(from_rate: u32, to_rate: u32) -> usize {
    let decimation_ratio = from_rate as f32 / to_rate.max(1) as f32;
    let mut taps = (decimation_ratio * 4.0).ceil().max(11.0) as usize;
    if taps % 2 == 0 {
        taps += 1;
    }
    taps.min(MAX_DOWNSAMPLING_TAPS)
}

pub(crate) fn low_pass_fir(input: &[f32], from_rate: u32, to_rate: u32, taps: usize) -> Vec<f32> {
    if input.is_empty() || taps <= 1 {
        return input.to_vec();
    }

    let normalized_cutoff = (to_rate as f32 * 0.5 / from_rate as f32).min(0.499);
    let coeffs = design_low_pass(normalized_cutoff, taps);
    let half = taps / 2;
    let mut output = Vec::with_capacity(input.len());

    for n in 0..input.len() {
        let mut acc = 0.0;
        for (k, coeff) in coeffs.iter().enumerate() {
            if let Some(idx) = n.checked_add(k).and_then(|sum| sum.checked_sub(half)) {
                if let Some(sample) = input.get(idx) {
                    acc += *sample * coeff;
                }
            }
        }
        output.push(acc);
    }

    output
}

pub(crate) fn adjust_length(mut data: Vec<f32>, desired: usize) -> Vec<f32> {
    match data.len().cmp(&desired) {
        CmpOrdering::Greater => data.truncate(desired),
        CmpOrdering::Less => {
            let pad = *data.last().unwrap_or(&0.0);
            data.resize(desired, pad);
        }
        CmpOrdering::Equal => {}
    }
    data
}

/// Hamming-windowed sinc taps, normalized to unity DC gain.
pub(crate) fn design_low_pass(normalized_cutoff: f32, taps: usize) -> Vec<f32> {
    let mut coeffs = Vec::with_capacity(taps);
    let m = (taps.max(2) - 1) as f32;

    for n in 0..taps {
        let centered = n as f32 - m / 2.0;
        let x = 2.0 * PI * normalized_cutoff * centered;
        let sinc = if centered == 0.0 {
            2.0 * normalized_cutoff
        } else {
            (2.0 * normalized_cutoff * x.sin()) / x
        };
        let window = if taps <= 1 {
            1.0
        } else {
            0.54 - 0.46 * ((2.0 * PI * n as f32) / m).cos()
        };
        coeffs.push(sinc * window);
    }

    let sum: f32 = coeffs.iter().sum();
    if sum != 0.0 {
        for coeff in coeffs.iter_mut() {
            *coeff /= sum;
        }
    }

    coeffs
}
