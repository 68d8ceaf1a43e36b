//! Background recording thread and the handle the caller joins on.

use super::backend::{CaptureBackend, CaptureControl, CaptureRequest};
use super::channel::{extract_channel, frame_count};
use super::meter::rms_db;
use super::wav::write_mono_wav;
use crate::error::{HarnessError, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Why a recording ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    Cancelled,
}

impl StopReason {
    pub fn label(self) -> &'static str {
        match self {
            StopReason::Completed => "completed",
            StopReason::Cancelled => "cancelled",
        }
    }
}

/// What a finished recording produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingOutcome {
    pub path: PathBuf,
    pub frames: usize,
    pub sample_rate: u32,
    pub channel: u16,
    /// RMS of the written channel in dBFS.
    pub level_db: f32,
    pub stop_reason: StopReason,
}

/// Everything the recording thread needs; moved into it whole.
pub(crate) struct RecordingRequest {
    pub backend: Arc<dyn CaptureBackend>,
    pub capture: CaptureRequest,
    pub channel: u16,
    pub path: PathBuf,
}

/// Handle to an in-flight recording.
///
/// Dropping it without awaiting stops the capture and joins the thread.
pub struct RecordingHandle {
    path: PathBuf,
    handle: Option<JoinHandle<Result<RecordingOutcome>>>,
    stop_flag: Arc<AtomicBool>,
}

impl RecordingHandle {
    pub(crate) fn new(
        path: PathBuf,
        handle: JoinHandle<Result<RecordingOutcome>>,
        stop_flag: Arc<AtomicBool>,
    ) -> Self {
        Self {
            path,
            handle: Some(handle),
            stop_flag,
        }
    }

    /// Where the WAV will be written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// End the capture early; whatever was captured is still written.
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }

    /// Block until the file is written.
    pub fn await_completion(mut self) -> Result<RecordingOutcome> {
        let Some(handle) = self.handle.take() else {
            return Err(HarnessError::Capture(
                "recording thread already joined".to_string(),
            ));
        };
        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(HarnessError::Capture(
                "recording thread panicked".to_string(),
            )),
        }
    }
}

impl Drop for RecordingHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.request_stop();
            if handle.join().is_err() {
                warn!(path = %self.path.display(), "recording thread panicked during drop");
            }
        }
    }
}

/// Body of the recording thread.
pub(crate) fn run_recording(request: RecordingRequest, control: CaptureControl) -> Result<RecordingOutcome> {
    let RecordingRequest {
        backend,
        capture,
        channel,
        path,
    } = request;

    let captured = backend.capture(&capture, &control)?;
    let frames = frame_count(&captured.samples, captured.channels);
    let stop_reason = if control.stop_requested() && frames < capture.frames {
        StopReason::Cancelled
    } else {
        StopReason::Completed
    };

    if stop_reason == StopReason::Completed && frames < capture.frames {
        return Err(HarnessError::Capture(format!(
            "captured {frames} of {} frames",
            capture.frames
        )));
    }
    if captured.channels < channel {
        return Err(HarnessError::Capture(format!(
            "stream opened {} channels, channel {channel} requested",
            captured.channels
        )));
    }

    let mono = extract_channel(&captured.samples, captured.channels, channel)?;
    drop(captured);
    let level_db = rms_db(&mono);
    write_mono_wav(&path, &mono, capture.sample_rate)?;

    debug!(frames, level_db, "capture channel extracted");
    info!(
        path = %path.display(),
        frames,
        stop_reason = stop_reason.label(),
        "recording written"
    );

    Ok(RecordingOutcome {
        path,
        frames: mono.len(),
        sample_rate: capture.sample_rate,
        channel,
        level_db,
        stop_reason,
    })
}
