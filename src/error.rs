//! Error type shared by the serial, capture, stimulus, and verification layers.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which kind of device a discovery step was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    SerialPort,
    AudioInput,
    MidiOutput,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeviceKind::SerialPort => "serial port",
            DeviceKind::AudioInput => "audio input device",
            DeviceKind::MidiOutput => "MIDI output port",
        };
        f.write_str(label)
    }
}

/// Errors surfaced to the caller. Nothing in the harness retries on its own.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("no {kind} matching \"{filter}\"{requirement} found")]
    DeviceNotFound {
        kind: DeviceKind,
        filter: String,
        requirement: String,
    },

    #[error("failed to connect to {kind} '{device}': {reason}")]
    ConnectionError {
        kind: DeviceKind,
        device: String,
        reason: String,
    },

    #[error("serial connection is not open")]
    NotConnected,

    #[error("expected a complete ::val:: response, got {partial:?}")]
    IncompleteResponse { partial: String },

    #[error("{label} file not found: {}", path.display())]
    MissingFile { label: &'static str, path: PathBuf },

    #[error("audio similarity {percent:.2}% is below threshold of {threshold}%")]
    SimilarityBelowThreshold { percent: f64, threshold: f64 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("audio capture failed: {0}")]
    Capture(String),

    #[error("MIDI send failed: {0}")]
    Midi(String),

    #[error("wav i/o failed: {0}")]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    pub(crate) fn not_found(kind: DeviceKind, filter: &str) -> Self {
        HarnessError::DeviceNotFound {
            kind,
            filter: filter.to_string(),
            requirement: String::new(),
        }
    }
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_not_found_names_the_filter() {
        let err = HarnessError::not_found(DeviceKind::SerialPort, "16bit");
        assert_eq!(
            err.to_string(),
            "no serial port matching \"16bit\" found"
        );
    }

    #[test]
    fn similarity_failure_reports_percent_and_threshold() {
        let err = HarnessError::SimilarityBelowThreshold {
            percent: 42.123,
            threshold: 97.0,
        };
        assert_eq!(
            err.to_string(),
            "audio similarity 42.12% is below threshold of 97%"
        );
    }
}
