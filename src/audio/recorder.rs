//! Multi-channel capture from an audio interface via CPAL.
//!
//! A `Recorder` is bound to one input device. Each `start_recording` call runs
//! on its own thread, pulls the requested channel out of the interleaved
//! stream and writes it as a mono WAV under the recordings directory.

use super::backend::{CaptureBackend, CaptureControl, CaptureRequest, CpalBackend};
use super::devices::{self, describe, AudioDeviceInfo};
use super::session::{run_recording, RecordingHandle, RecordingRequest};
use crate::error::{DeviceKind, HarnessError, Result};
use cpal::traits::HostTrait;
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_RECORDINGS_DIR: &str = ".recordings";

/// How long `start_recording` waits for the stream to start.
pub const DEFAULT_ARM_GRACE: Duration = Duration::from_millis(500);

/// Audio input device wrapper.
pub struct Recorder {
    info: AudioDeviceInfo,
    backend: Arc<dyn CaptureBackend>,
    recordings_dir: PathBuf,
    arm_grace: Duration,
}

impl Recorder {
    /// Every device the default host reports.
    pub fn list_devices() -> Result<Vec<AudioDeviceInfo>> {
        devices::list_devices()
    }

    /// Bind to the first input device whose name contains `name_hint` and which
    /// exposes at least `min_channels` inputs.
    pub fn resolve(name_hint: &str, min_channels: u16) -> Result<Self> {
        let host = cpal::default_host();
        let candidates = host
            .input_devices()
            .map_err(|err| HarnessError::ConnectionError {
                kind: DeviceKind::AudioInput,
                device: host.id().name().to_string(),
                reason: err.to_string(),
            })?;
        let described: Vec<(AudioDeviceInfo, cpal::Device)> = candidates
            .map(|device| (describe(&device), device))
            .collect();
        let infos: Vec<AudioDeviceInfo> = described.iter().map(|(info, _)| info.clone()).collect();
        let index = devices::select_device_index(&infos, name_hint, min_channels)
            .ok_or_else(|| devices::not_found(name_hint, min_channels))?;
        let (info, device) = described
            .into_iter()
            .nth(index)
            .ok_or_else(|| devices::not_found(name_hint, min_channels))?;

        info!(device = %info.name, channels = info.input_channel_count, "audio input resolved");
        Ok(Self::with_backend(info, Arc::new(CpalBackend::new(device))))
    }

    /// Recorder over any capture source.
    pub fn with_backend(info: AudioDeviceInfo, backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            info,
            backend,
            recordings_dir: PathBuf::from(DEFAULT_RECORDINGS_DIR),
            arm_grace: DEFAULT_ARM_GRACE,
        }
    }

    pub fn with_recordings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recordings_dir = dir.into();
        self
    }

    pub fn with_arm_grace(mut self, grace: Duration) -> Self {
        self.arm_grace = grace;
        self
    }

    pub fn device(&self) -> &AudioDeviceInfo {
        &self.info
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    /// Start capturing `duration` of `channel` (1-based) in the background.
    ///
    /// Returns once the stream is running or the arming grace period passes.
    pub fn start_recording(
        &self,
        filename: &str,
        duration: Duration,
        sample_rate: u32,
        channel: u16,
    ) -> Result<RecordingHandle> {
        if channel == 0 || channel > self.info.input_channel_count {
            return Err(HarnessError::InvalidRequest(format!(
                "channel {channel} is outside 1..={} for '{}'",
                self.info.input_channel_count, self.info.name
            )));
        }
        if duration.is_zero() {
            return Err(HarnessError::InvalidRequest(
                "recording duration must be positive".to_string(),
            ));
        }
        if sample_rate == 0 {
            return Err(HarnessError::InvalidRequest(
                "sample rate must be positive".to_string(),
            ));
        }
        validate_filename(filename)?;

        std::fs::create_dir_all(&self.recordings_dir)?;
        let path = self.recordings_dir.join(filename);
        let frames = ((duration.as_secs_f64() * f64::from(sample_rate)).round() as usize).max(1);

        let stop_flag = Arc::new(AtomicBool::new(false));
        let (armed_tx, armed_rx) = bounded::<()>(1);
        let request = RecordingRequest {
            backend: self.backend.clone(),
            capture: CaptureRequest {
                sample_rate,
                channels: channel,
                frames,
            },
            channel,
            path: path.clone(),
        };
        let control = CaptureControl::new(stop_flag.clone(), Some(armed_tx));

        info!(
            device = %self.info.name,
            path = %path.display(),
            channel,
            sample_rate,
            seconds = duration.as_secs_f64(),
            "recording started"
        );
        let handle = thread::Builder::new()
            .name("synthcheck-capture".to_string())
            .spawn(move || run_recording(request, control))?;

        match armed_rx.recv_timeout(self.arm_grace) {
            Ok(()) => debug!("capture stream armed"),
            Err(RecvTimeoutError::Timeout) => {
                debug!(grace_ms = self.arm_grace.as_millis() as u64, "capture not armed within grace period")
            }
            // Thread already exited; its result surfaces from await_completion.
            Err(RecvTimeoutError::Disconnected) => {}
        }

        Ok(RecordingHandle::new(path, handle, stop_flag))
    }
}

/// Recordings are addressed by bare file name so they pair with references.
fn validate_filename(filename: &str) -> Result<()> {
    let path = Path::new(filename);
    let plain = !filename.is_empty()
        && filename != "."
        && filename != ".."
        && path.file_name().map(|name| name == path.as_os_str()).unwrap_or(false);
    if plain {
        Ok(())
    } else {
        Err(HarnessError::InvalidRequest(format!(
            "recording filename must be a plain file name, got {filename:?}"
        )))
    }
}
