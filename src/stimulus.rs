//! MIDI stimulus: note events sent to the synth while audio is captured.

use crate::error::{DeviceKind, HarnessError, Result};
use midir::{MidiOutput, MidiOutputConnection};
use tracing::{debug, info};

const CLIENT_NAME: &str = "synthcheck";
const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

/// Where raw MIDI bytes go. midir in production, a recorder in tests.
pub trait MidiSink {
    fn send_message(&mut self, message: &[u8]) -> Result<()>;
}

impl MidiSink for MidiOutputConnection {
    fn send_message(&mut self, message: &[u8]) -> Result<()> {
        self.send(message)
            .map_err(|err| HarnessError::Midi(err.to_string()))
    }
}

/// An open MIDI output used to play notes on the device.
pub struct MidiStimulus {
    port_name: String,
    sink: Box<dyn MidiSink>,
}

fn midi_client() -> Result<MidiOutput> {
    MidiOutput::new(CLIENT_NAME).map_err(|err| HarnessError::ConnectionError {
        kind: DeviceKind::MidiOutput,
        device: CLIENT_NAME.to_string(),
        reason: err.to_string(),
    })
}

/// Names of every MIDI output port the system exposes.
pub fn list_ports() -> Result<Vec<String>> {
    let output = midi_client()?;
    Ok(output
        .ports()
        .iter()
        .filter_map(|port| output.port_name(port).ok())
        .collect())
}

impl MidiStimulus {
    /// Open the first output port whose name contains `port_hint`.
    pub fn connect(port_hint: &str) -> Result<Self> {
        let output = midi_client()?;
        let ports = output.ports();
        let found = ports.iter().find_map(|port| {
            output
                .port_name(port)
                .ok()
                .filter(|name| name.contains(port_hint))
                .map(|name| (port.clone(), name))
        });
        let Some((port, port_name)) = found else {
            return Err(HarnessError::not_found(DeviceKind::MidiOutput, port_hint));
        };
        let connection = output
            .connect(&port, "synthcheck-stimulus")
            .map_err(|err| HarnessError::ConnectionError {
                kind: DeviceKind::MidiOutput,
                device: port_name.clone(),
                reason: err.to_string(),
            })?;
        info!(port = %port_name, "MIDI output connected");
        Ok(Self::with_sink(port_name, Box::new(connection)))
    }

    pub fn with_sink(port_name: impl Into<String>, sink: Box<dyn MidiSink>) -> Self {
        Self {
            port_name: port_name.into(),
            sink,
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// `channel` is 1-based (1..=16).
    pub fn send_note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<()> {
        let message = note_on_message(channel, note, velocity)?;
        debug!(channel, note, velocity, "note on");
        self.sink.send_message(&message)
    }

    pub fn send_note_off(&mut self, channel: u8, note: u8) -> Result<()> {
        let message = note_off_message(channel, note)?;
        debug!(channel, note, "note off");
        self.sink.send_message(&message)
    }
}

pub fn note_on_message(channel: u8, note: u8, velocity: u8) -> Result<[u8; 3]> {
    channel_message(NOTE_ON, channel, note, velocity)
}

pub fn note_off_message(channel: u8, note: u8) -> Result<[u8; 3]> {
    channel_message(NOTE_OFF, channel, note, 0)
}

fn channel_message(status: u8, channel: u8, data1: u8, data2: u8) -> Result<[u8; 3]> {
    if !(1..=16).contains(&channel) {
        return Err(HarnessError::InvalidRequest(format!(
            "MIDI channel {channel} is outside 1..=16"
        )));
    }
    if data1 > 127 || data2 > 127 {
        return Err(HarnessError::InvalidRequest(format!(
            "MIDI data bytes must be 0..=127, got {data1} and {data2}"
        )));
    }
    Ok([status | (channel - 1), data1, data2])
}
