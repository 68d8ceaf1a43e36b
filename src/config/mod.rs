//! Command-line parsing, the optional JSON device file, and validation.

mod validation;

use crate::audio::DEFAULT_RECORDINGS_DIR;
use crate::verify::{VerifySettings, DEFAULT_REFERENCES_DIR};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SERIAL_FILTER: &str = "16bit";
pub const DEFAULT_DEVICE_HINT: &str = "M6";
pub const DEFAULT_AUDIO_CHANNEL: u16 = 3;
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_RECORD_SECONDS: f64 = 1.0;
pub const DEFAULT_MIN_SIMILARITY: f64 = 97.0;
pub const DEFAULT_SILENCE_THRESHOLD: f32 = 0.01;
pub const DEFAULT_NOTE_VELOCITY: u8 = 100;

/// CLI options for the synthcheck harness. Validated before any device is touched.
#[derive(Debug, Parser, Clone)]
#[command(about = "synthcheck hardware test harness for the 16bit synth", author, version)]
pub struct HarnessConfig {
    /// JSON file with device names (midi_device_name, audio_device_name, audio_in_channel, ...)
    #[arg(long = "config", env = "SYNTHCHECK_CONFIG", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Substring of the serial port description to connect to
    #[arg(long, env = "SYNTHCHECK_SERIAL_FILTER", default_value = DEFAULT_SERIAL_FILTER)]
    pub serial_filter: String,

    /// Substring of the MIDI output port name used for stimulus
    #[arg(long, env = "SYNTHCHECK_MIDI_PORT", default_value = DEFAULT_DEVICE_HINT)]
    pub midi_port: String,

    /// Substring of the audio interface name used for capture
    #[arg(long, env = "SYNTHCHECK_AUDIO_DEVICE", default_value = DEFAULT_DEVICE_HINT)]
    pub audio_device: String,

    /// Input channel (1-based) wired to the synth output
    #[arg(long, default_value_t = DEFAULT_AUDIO_CHANNEL)]
    pub audio_channel: u16,

    /// Capture sample rate (Hz)
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Capture duration in seconds
    #[arg(long, default_value_t = DEFAULT_RECORD_SECONDS)]
    pub record_seconds: f64,

    /// Minimum spectral similarity (percent) for a recording to pass
    #[arg(long, default_value_t = DEFAULT_MIN_SIMILARITY)]
    pub min_similarity: f64,

    /// Fraction of peak amplitude below which edge samples count as silence
    #[arg(long, default_value_t = DEFAULT_SILENCE_THRESHOLD)]
    pub silence_threshold: f32,

    /// Where captured WAVs are written
    #[arg(long, default_value = DEFAULT_RECORDINGS_DIR)]
    pub recordings_dir: PathBuf,

    /// Where reference WAVs are read from
    #[arg(long, default_value = DEFAULT_REFERENCES_DIR)]
    pub references_dir: PathBuf,

    /// Print serial ports, audio devices and MIDI outputs, then exit
    #[arg(long = "list-devices", default_value_t = false)]
    pub list_devices: bool,

    /// Send one command to the device and print its response
    #[arg(long, value_name = "COMMAND")]
    pub send: Option<String>,

    /// Compare <recordings-dir>/<FILE> against <references-dir>/<FILE>
    #[arg(long, value_name = "FILE")]
    pub verify: Option<String>,

    /// Record <FILE> from the audio interface, then verify it
    #[arg(long, value_name = "FILE")]
    pub record: Option<String>,

    /// MIDI note to play while recording
    #[arg(long)]
    pub note: Option<u8>,

    /// MIDI channel (1-16) for --note
    #[arg(long = "midi-channel", default_value_t = 1)]
    pub midi_channel: u8,

    /// Velocity for --note
    #[arg(long, default_value_t = DEFAULT_NOTE_VELOCITY)]
    pub velocity: u8,

    /// Enable JSON trace logging to a file
    #[arg(long = "logs", env = "SYNTHCHECK_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all logging (overrides --logs and --verbose)
    #[arg(long = "no-logs", env = "SYNTHCHECK_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Log to stderr
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,
}

/// Keys accepted in the JSON device file. Anything else is ignored.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileOverrides {
    pub midi_device_name: Option<String>,
    pub audio_device_name: Option<String>,
    pub audio_in_channel: Option<u16>,
    pub serial_filter: Option<String>,
    pub min_similarity: Option<f64>,
}

/// Everything needed to start a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    pub device_hint: String,
    pub channel: u16,
    pub sample_rate: u32,
    pub duration: Duration,
    pub recordings_dir: PathBuf,
}

impl HarnessConfig {
    pub fn verify_settings(&self) -> VerifySettings {
        VerifySettings {
            recordings_dir: self.recordings_dir.clone(),
            references_dir: self.references_dir.clone(),
            min_similarity: self.min_similarity,
            silence_threshold: self.silence_threshold,
        }
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            device_hint: self.audio_device.clone(),
            channel: self.audio_channel,
            sample_rate: self.sample_rate,
            duration: Duration::try_from_secs_f64(self.record_seconds).unwrap_or_default(),
            recordings_dir: self.recordings_dir.clone(),
        }
    }

    pub(crate) fn logging_enabled(&self) -> bool {
        (self.logs || self.verbose) && !self.no_logs
    }
}
