//! Audio capture pipeline.
//!
//! Resolves a multi-channel interface, records on a background thread, and
//! persists one channel as WAV for the verifier to compare.

mod backend;
mod channel;
mod devices;
mod meter;
mod recorder;
pub mod resample;
mod session;
pub mod wav;

pub use backend::{CaptureBackend, CaptureControl, CaptureRequest, CapturedAudio, CpalBackend};
pub use channel::extract_channel;
pub use devices::{list_devices, select_device, select_device_index, AudioDeviceInfo};
pub use recorder::{Recorder, DEFAULT_ARM_GRACE, DEFAULT_RECORDINGS_DIR};
pub use resample::resample;
pub use session::{RecordingHandle, RecordingOutcome, StopReason};
pub use wav::{read_first_channel, write_mono_wav, AudioBuffer};

/// Resolve an input device by name hint and channel count.
pub fn resolve_device(name_hint: &str, min_channels: u16) -> crate::Result<Recorder> {
    Recorder::resolve(name_hint, min_channels)
}
