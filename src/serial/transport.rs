//! Owns the serial connection to the device and speaks its line protocol.

use super::discovery::{list_serial_ports, select_serial_port, SerialPortDescriptor};
use super::framer::{self, Frame};
use crate::error::{DeviceKind, HarnessError, Result};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const BAUD_RATE: u32 = 115_200;
pub const READ_TIMEOUT: Duration = Duration::from_secs(2);
const LINE_TERMINATOR: char = '\n';

/// Byte stream the transport talks through. Real ports and scripted test
/// links both implement this.
pub trait SerialLink: Read + Write + Send {
    /// Throw away anything the device sent that nobody has read yet.
    fn clear_input(&mut self) -> std::io::Result<()>;
}

impl SerialLink for Box<dyn SerialPort> {
    fn clear_input(&mut self) -> std::io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(std::io::Error::from)
    }
}

/// Connection lifecycle as observed by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Failed,
}

/// Open `port` with the device's fixed line settings (115200-8-N-1, no flow control).
pub fn open_serial_port(port: &SerialPortDescriptor) -> Result<Box<dyn SerialLink>> {
    let link = serialport::new(&port.port_name, BAUD_RATE)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(Parity::None)
        .flow_control(FlowControl::None)
        .timeout(READ_TIMEOUT)
        .open()
        .map_err(|err| HarnessError::ConnectionError {
            kind: DeviceKind::SerialPort,
            device: format!("{} ({})", port.port_name, port.description),
            reason: err.to_string(),
        })?;
    Ok(Box::new(link))
}

/// One serial connection per harness run. Not shared across threads.
pub struct Transport {
    link: Option<Box<dyn SerialLink>>,
    port: Option<SerialPortDescriptor>,
    state: ConnectionState,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    pub fn new() -> Self {
        Self {
            link: None,
            port: None,
            state: ConnectionState::Disconnected,
        }
    }

    /// Wrap a link that is already open.
    pub fn with_link(link: Box<dyn SerialLink>) -> Self {
        Self {
            link: Some(link),
            port: None,
            state: ConnectionState::Connected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// The port picked by the last successful discovery.
    pub fn port(&self) -> Option<&SerialPortDescriptor> {
        self.port.as_ref()
    }

    /// Scan the system's serial ports and open the first one whose
    /// description contains `name_filter`.
    pub fn discover_and_connect(&mut self, name_filter: &str) -> Result<()> {
        let ports = list_serial_ports()?;
        self.connect_to(&ports, name_filter, open_serial_port)
    }

    /// Selection + open over an explicit port list.
    pub fn connect_to<F>(
        &mut self,
        ports: &[SerialPortDescriptor],
        name_filter: &str,
        open: F,
    ) -> Result<()>
    where
        F: FnOnce(&SerialPortDescriptor) -> Result<Box<dyn SerialLink>>,
    {
        self.close();
        let Some(port) = select_serial_port(ports, name_filter) else {
            debug!(
                filter = name_filter,
                candidates = ports.len(),
                "no serial port description matched"
            );
            return Err(HarnessError::not_found(DeviceKind::SerialPort, name_filter));
        };

        match open(port) {
            Ok(link) => {
                info!(port = %port.port_name, description = %port.description, "serial connected");
                self.link = Some(link);
                self.port = Some(port.clone());
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(err) => {
                self.state = ConnectionState::Failed;
                Err(match err {
                    HarnessError::ConnectionError { .. } => err,
                    other => HarnessError::ConnectionError {
                        kind: DeviceKind::SerialPort,
                        device: port.port_name.clone(),
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    fn link_mut(&mut self) -> Result<&mut Box<dyn SerialLink>> {
        self.link.as_mut().ok_or(HarnessError::NotConnected)
    }

    /// Write one command line. Does not wait for a reply.
    pub fn send(&mut self, command: &str) -> Result<()> {
        let link = self.link_mut()?;
        let line = normalize_command(command);
        debug!(command = line.trim_end(), "serial send");
        link.write_all(line.as_bytes())?;
        link.flush()?;
        Ok(())
    }

    /// Send a command and frame exactly one response.
    pub fn send_and_receive(&mut self, command: &str) -> Result<String> {
        Ok(self.send_and_receive_frame(command)?.text)
    }

    /// Like [`Transport::send_and_receive`] but keeps the framing verdict.
    pub fn send_and_receive_frame(&mut self, command: &str) -> Result<Frame> {
        self.link_mut()?.clear_input()?;
        self.send(command)?;
        let frame = framer::read_frame(self.link_mut()?)?;
        if frame.is_truncated_value() {
            warn!(command, partial = %frame.text, "returning truncated tagged value");
        }
        debug!(response = %frame.text, kind = ?frame.kind, "serial receive");
        Ok(frame)
    }

    /// Send a command that answers with `::val::<payload>::val::` and return
    /// the payload.
    pub fn query_value(&mut self, command: &str) -> Result<String> {
        let frame = self.send_and_receive_frame(command)?;
        if frame.is_complete() {
            if let Some(payload) = framer::unwrap(&frame.text) {
                return Ok(payload.to_string());
            }
        }
        Err(HarnessError::IncompleteResponse {
            partial: frame.text,
        })
    }

    /// Drop the connection. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.link.take().is_some() {
            debug!("serial connection closed");
        }
        self.port = None;
        self.state = ConnectionState::Disconnected;
    }
}

/// Append `\n` unless the command already ends with one.
pub(crate) fn normalize_command(command: &str) -> String {
    if command.ends_with(LINE_TERMINATOR) {
        command.to_string()
    } else {
        format!("{command}{LINE_TERMINATOR}")
    }
}
