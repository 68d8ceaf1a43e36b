//! Spectral comparison of a captured recording against its reference.
//!
//! Both signals are trimmed of edge silence, brought to the reference sample
//! rate and cut to a common length; the score is the cosine similarity of
//! their magnitude spectra expressed as a percentage.

mod spectrum;
mod trim;

pub use spectrum::{cosine_similarity, magnitude_spectrum};
pub use trim::trim_silence;

use crate::audio::{read_first_channel, resample, AudioBuffer, DEFAULT_RECORDINGS_DIR};
use crate::error::{HarnessError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_REFERENCES_DIR: &str = "references";
/// Threshold `VerifySettings::default` uses; the CLI default is stricter.
pub const HELPER_MIN_SIMILARITY: f64 = 95.0;
pub const DEFAULT_SILENCE_THRESHOLD: f32 = 0.01;

/// A passing comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityReport {
    pub percent: f64,
    pub threshold: f64,
    /// Samples per signal after trimming and length matching.
    pub compared_samples: usize,
    pub sample_rate: u32,
}

/// Where recordings and references live and how strict the comparison is.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifySettings {
    pub recordings_dir: PathBuf,
    pub references_dir: PathBuf,
    pub min_similarity: f64,
    pub silence_threshold: f32,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            recordings_dir: PathBuf::from(DEFAULT_RECORDINGS_DIR),
            references_dir: PathBuf::from(DEFAULT_REFERENCES_DIR),
            min_similarity: HELPER_MIN_SIMILARITY,
            silence_threshold: DEFAULT_SILENCE_THRESHOLD,
        }
    }
}

/// Compare `captured` against `reference`; fails below `min_similarity` percent.
pub fn verify(
    captured: &Path,
    reference: &Path,
    min_similarity: f64,
    silence_threshold: f32,
) -> Result<SimilarityReport> {
    ensure_exists("recording", captured)?;
    ensure_exists("reference", reference)?;

    let captured_audio = read_first_channel(captured)?;
    let reference_audio = read_first_channel(reference)?;
    let (percent, compared_samples) = similarity_percent(&captured_audio, &reference_audio, silence_threshold);

    info!(
        captured = %captured.display(),
        reference = %reference.display(),
        percent,
        threshold = min_similarity,
        "audio similarity"
    );

    if percent < min_similarity {
        return Err(HarnessError::SimilarityBelowThreshold {
            percent,
            threshold: min_similarity,
        });
    }
    Ok(SimilarityReport {
        percent,
        threshold: min_similarity,
        compared_samples,
        sample_rate: reference_audio.sample_rate,
    })
}

/// Verify `<recordings_dir>/<filename>` against `<references_dir>/<filename>`.
pub fn verify_recording(filename: &str, settings: &VerifySettings) -> Result<SimilarityReport> {
    verify(
        &settings.recordings_dir.join(filename),
        &settings.references_dir.join(filename),
        settings.min_similarity,
        settings.silence_threshold,
    )
}

/// Similarity score in percent plus the number of samples compared.
pub fn similarity_percent(
    captured: &AudioBuffer,
    reference: &AudioBuffer,
    silence_threshold: f32,
) -> (f64, usize) {
    let captured_trimmed = trim_silence(&captured.samples, silence_threshold);
    let reference_trimmed = trim_silence(&reference.samples, silence_threshold);

    let mut captured_signal = if captured.sample_rate != reference.sample_rate {
        debug!(
            from = captured.sample_rate,
            to = reference.sample_rate,
            "resampling capture to reference rate"
        );
        resample(captured_trimmed, captured.sample_rate, reference.sample_rate)
    } else {
        captured_trimmed.to_vec()
    };
    let mut reference_signal = reference_trimmed.to_vec();

    let common = captured_signal.len().min(reference_signal.len());
    captured_signal.truncate(common);
    reference_signal.truncate(common);

    let similarity = cosine_similarity(
        &magnitude_spectrum(&captured_signal),
        &magnitude_spectrum(&reference_signal),
    );
    (similarity * 100.0, common)
}

fn ensure_exists(label: &'static str, path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(HarnessError::MissingFile {
            label,
            path: path.to_path_buf(),
        })
    }
}
