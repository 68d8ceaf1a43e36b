//! Hardware-in-the-loop test harness for the 16bit synthesizer.
//!
//! Talks to the device over serial, plays MIDI stimulus, records its audio
//! output and scores the recording against a reference by spectral similarity.

pub mod audio;
pub mod config;
pub mod error;
mod lock;
pub mod logging;
pub mod serial;
pub mod stimulus;
#[cfg(test)]
mod test_support;
pub mod verify;

pub use audio::{AudioDeviceInfo, Recorder, RecordingHandle, RecordingOutcome, StopReason};
pub use config::HarnessConfig;
pub use error::{DeviceKind, HarnessError, Result};
pub use serial::{Frame, FrameKind, SerialPortDescriptor, Transport};
pub use stimulus::MidiStimulus;
pub use verify::{verify, verify_recording, SimilarityReport, VerifySettings};
