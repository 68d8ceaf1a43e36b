use super::{FileOverrides, HarnessConfig};
use anyhow::{bail, Context, Result};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches};
use std::ffi::OsString;
use std::fs;
use std::path::Path;

const MAX_AUDIO_CHANNEL: u16 = 32;
const MAX_RECORD_SECONDS: f64 = 60.0;

impl HarnessConfig {
    /// Parse CLI arguments, fold in the JSON device file and validate.
    pub fn parse_args() -> Result<Self> {
        Self::build(Self::command().get_matches())
    }

    /// Same as `parse_args` over an explicit argument list.
    pub fn try_parse_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::build(Self::command().try_get_matches_from(args)?)
    }

    fn build(matches: ArgMatches) -> Result<Self> {
        let mut config = Self::from_arg_matches(&matches)?;
        if let Some(path) = config.config_file.clone() {
            let overrides = load_overrides(&path)?;
            config.apply_overrides(overrides, |id| {
                matches.value_source(id) == Some(ValueSource::CommandLine)
            });
        }
        config.validate()?;
        Ok(config)
    }

    /// Copy file values over fields the command line did not set explicitly.
    pub fn apply_overrides(&mut self, overrides: FileOverrides, explicit: impl Fn(&str) -> bool) {
        if let Some(value) = overrides.midi_device_name {
            if !explicit("midi_port") {
                self.midi_port = value;
            }
        }
        if let Some(value) = overrides.audio_device_name {
            if !explicit("audio_device") {
                self.audio_device = value;
            }
        }
        if let Some(value) = overrides.audio_in_channel {
            if !explicit("audio_channel") {
                self.audio_channel = value;
            }
        }
        if let Some(value) = overrides.serial_filter {
            if !explicit("serial_filter") {
                self.serial_filter = value;
            }
        }
        if let Some(value) = overrides.min_similarity {
            if !explicit("min_similarity") {
                self.min_similarity = value;
            }
        }
    }

    /// Check values and normalize device hints.
    pub fn validate(&mut self) -> Result<()> {
        for (flag, value) in [
            ("--serial-filter", &mut self.serial_filter),
            ("--midi-port", &mut self.midi_port),
            ("--audio-device", &mut self.audio_device),
        ] {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                bail!("{flag} cannot be empty");
            }
            if trimmed.len() != value.len() {
                *value = trimmed.to_string();
            }
        }

        if !(1..=MAX_AUDIO_CHANNEL).contains(&self.audio_channel) {
            bail!(
                "--audio-channel must be between 1 and {MAX_AUDIO_CHANNEL}, got {}",
                self.audio_channel
            );
        }
        if !(8_000..=192_000).contains(&self.sample_rate) {
            bail!(
                "--sample-rate must be between 8000 and 192000 Hz, got {}",
                self.sample_rate
            );
        }
        if !self.record_seconds.is_finite()
            || self.record_seconds <= 0.0
            || self.record_seconds > MAX_RECORD_SECONDS
        {
            bail!(
                "--record-seconds must be greater than 0 and at most {MAX_RECORD_SECONDS}, got {}",
                self.record_seconds
            );
        }
        if !(0.0..=100.0).contains(&self.min_similarity) {
            bail!(
                "--min-similarity must be between 0 and 100, got {}",
                self.min_similarity
            );
        }
        if !(0.0..1.0).contains(&self.silence_threshold) {
            bail!(
                "--silence-threshold must be in [0, 1), got {}",
                self.silence_threshold
            );
        }
        if !(1..=16).contains(&self.midi_channel) {
            bail!(
                "--midi-channel must be between 1 and 16, got {}",
                self.midi_channel
            );
        }
        if let Some(note) = self.note {
            if note > 127 {
                bail!("--note must be between 0 and 127, got {note}");
            }
        }
        if self.velocity > 127 {
            bail!("--velocity must be between 0 and 127, got {}", self.velocity);
        }
        if self.note.is_some() && self.record.is_none() {
            bail!("--note only applies together with --record");
        }
        for (flag, name) in [("--verify", &self.verify), ("--record", &self.record)] {
            if let Some(name) = name {
                let path = Path::new(name);
                if path.file_name() != Some(path.as_os_str()) {
                    bail!("{flag} expects a bare file name, got {name:?}");
                }
            }
        }
        Ok(())
    }
}

pub(super) fn load_overrides(path: &Path) -> Result<FileOverrides> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}
