//! Capture sources. The recorder talks to a `CaptureBackend`; cpal is the
//! production one.

use super::channel::append_converted;
use crate::error::{HarnessError, Result};
use crate::lock::lock_or_recover;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig, SupportedStreamConfig};
use crossbeam_channel::{bounded, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Extra time allowed past the nominal duration before a capture is called short.
const DEADLINE_SLACK: Duration = Duration::from_secs(2);

/// What the recording thread asks a backend for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub sample_rate: u32,
    /// Minimum interleaved channel count; the backend may open more.
    pub channels: u16,
    pub frames: usize,
}

impl CaptureRequest {
    pub fn nominal_duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames as f64 / f64::from(self.sample_rate))
    }
}

/// Interleaved samples as delivered, plus the channel count actually opened.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAudio {
    pub samples: Vec<f32>,
    pub channels: u16,
}

/// Signals shared between the recording thread and its backend.
pub struct CaptureControl {
    stop: Arc<AtomicBool>,
    armed: Option<Sender<()>>,
}

impl CaptureControl {
    pub fn new(stop: Arc<AtomicBool>, armed: Option<Sender<()>>) -> Self {
        Self { stop, armed }
    }

    /// Tell the waiting caller the stream is running.
    pub fn mark_armed(&self) {
        if let Some(armed) = &self.armed {
            let _ = armed.try_send(());
        }
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

/// Anything that can fill a multi-channel buffer on demand.
///
/// Implementations block the calling thread until `request.frames` frames are
/// captured or `control.stop_requested()` turns true, and call
/// `control.mark_armed()` once samples start flowing.
pub trait CaptureBackend: Send + Sync + 'static {
    fn capture(&self, request: &CaptureRequest, control: &CaptureControl) -> Result<CapturedAudio>;
}

/// Input stream on a cpal device.
pub struct CpalBackend {
    device: Mutex<cpal::Device>,
}

impl CpalBackend {
    pub fn new(device: cpal::Device) -> Self {
        Self {
            device: Mutex::new(device),
        }
    }
}

fn capture_error(context: &str, err: impl std::fmt::Display) -> HarnessError {
    HarnessError::Capture(format!("{context}: {err}"))
}

/// Narrowest input config with enough channels at the requested rate,
/// preferring f32 samples.
fn choose_input_config(
    device: &cpal::Device,
    sample_rate: u32,
    channels: u16,
) -> Result<SupportedStreamConfig> {
    let configs = device
        .supported_input_configs()
        .map_err(|err| capture_error("failed to query input configs", err))?;
    let chosen = configs
        .filter(|range| {
            range.channels() >= channels
                && range.min_sample_rate().0 <= sample_rate
                && sample_rate <= range.max_sample_rate().0
        })
        .min_by_key(|range| (range.channels(), range.sample_format() != SampleFormat::F32));
    match chosen {
        Some(range) => Ok(range.with_sample_rate(SampleRate(sample_rate))),
        None => Err(HarnessError::Capture(format!(
            "device has no input config with {channels}+ channels at {sample_rate} Hz"
        ))),
    }
}

impl CaptureBackend for CpalBackend {
    fn capture(&self, request: &CaptureRequest, control: &CaptureControl) -> Result<CapturedAudio> {
        let device = lock_or_recover(&self.device, "cpal device");
        let supported = choose_input_config(&device, request.sample_rate, request.channels)?;
        let format = supported.sample_format();
        let stream_config: StreamConfig = supported.into();
        let channels = stream_config.channels;
        let wanted = request.frames * usize::from(channels);

        debug!(
            format = ?format,
            sample_rate = request.sample_rate,
            channels,
            frames = request.frames,
            "opening capture stream"
        );

        // cpal delivers samples on its own callback thread.
        let buffer = Arc::new(Mutex::new(Vec::<f32>::with_capacity(wanted)));
        let (err_tx, err_rx) = bounded::<String>(4);
        let err_fn = move |err: cpal::StreamError| {
            let _ = err_tx.try_send(err.to_string());
        };

        let stream = match format {
            SampleFormat::F32 => {
                let buffer = buffer.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _| {
                        if let Ok(mut buf) = buffer.lock() {
                            append_converted(&mut buf, data, |sample| sample);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::I16 => {
                let buffer = buffer.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _| {
                        if let Ok(mut buf) = buffer.lock() {
                            append_converted(&mut buf, data, |sample| sample as f32 / 32_768.0);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::U16 => {
                let buffer = buffer.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[u16], _| {
                        if let Ok(mut buf) = buffer.lock() {
                            append_converted(&mut buf, data, |sample| {
                                (sample as f32 - 32_768.0) / 32_768.0
                            });
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::I32 => {
                let buffer = buffer.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i32], _| {
                        if let Ok(mut buf) = buffer.lock() {
                            append_converted(&mut buf, data, |sample| {
                                sample as f32 / 2_147_483_648.0
                            });
                        }
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(HarnessError::Capture(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        }
        .map_err(|err| capture_error("failed to build input stream", err))?;

        stream
            .play()
            .map_err(|err| capture_error("failed to start input stream", err))?;
        control.mark_armed();

        let deadline = Instant::now() + request.nominal_duration() + DEADLINE_SLACK;
        let mut stream_error = None;
        loop {
            if lock_or_recover(&buffer, "capture buffer").len() >= wanted {
                break;
            }
            if control.stop_requested() {
                debug!("capture stop requested");
                break;
            }
            match err_rx.try_recv() {
                Ok(err) => {
                    stream_error = Some(err);
                    break;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }
            if Instant::now() >= deadline {
                warn!("capture deadline passed before all frames arrived");
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        if let Err(err) = stream.pause() {
            debug!("failed to pause audio stream: {err}");
        }
        drop(stream);

        if let Some(err) = stream_error {
            return Err(HarnessError::Capture(format!("audio stream error: {err}")));
        }

        let mut samples = std::mem::take(&mut *lock_or_recover(&buffer, "capture buffer"));
        samples.truncate(wanted);
        Ok(CapturedAudio { samples, channels })
    }
}
