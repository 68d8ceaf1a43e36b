//! Signal and WAV fixtures shared by unit tests.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::Path;

pub(crate) fn multi_tone_signal(tones: &[(f32, f32)], sample_rate: u32, seconds: f32) -> Vec<f32> {
    let total_samples = (sample_rate as f32 * seconds) as usize;
    (0..total_samples)
        .map(|n| {
            tones.iter().fold(0.0, |acc, (freq, amp)| {
                acc + amp * (2.0 * PI * freq * n as f32 / sample_rate as f32).sin()
            })
        })
        .collect()
}

pub(crate) fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
    multi_tone_signal(&[(freq, 0.5)], sample_rate, seconds)
}

pub(crate) fn goertzel_power(samples: &[f32], sample_rate: u32, target_hz: f32) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let len = samples.len() as f32;
    let omega = 2.0 * PI * target_hz / sample_rate as f32;
    let coeff = 2.0 * omega.cos();
    let mut q1 = 0.0;
    let mut q2 = 0.0;
    for &sample in samples {
        let q0 = coeff * q1 - q2 + sample;
        q2 = q1;
        q1 = q0;
    }
    let power = q1 * q1 + q2 * q2 - coeff * q1 * q2;
    (power / len).max(0.0)
}

pub(crate) fn write_float_wav(path: &Path, samples: &[f32], sample_rate: u32) {
    crate::audio::write_mono_wav(path, samples, sample_rate).expect("write float wav");
}

/// 16-bit PCM with `channels` interleaved copies of `samples`.
pub(crate) fn write_pcm16_wav(path: &Path, samples: &[f32], sample_rate: u32, channels: u16) {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).expect("create pcm wav");
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * 32_767.0) as i16;
        for _ in 0..channels {
            writer.write_sample(value).expect("write pcm sample");
        }
    }
    writer.finalize().expect("finalize pcm wav");
}
