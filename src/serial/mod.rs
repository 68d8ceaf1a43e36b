//! Serial command/response link to the synthesizer module.
//!
//! Commands are plain text lines (`version`, `get-app`, `set-app <name>`).
//! Responses come back either as a single line or wrapped in `::val::`
//! sentinels; [`framer`] tells the two apart on the fly.

mod discovery;
pub mod framer;
#[cfg(test)]
mod tests;
mod transport;
mod utf8;

pub use discovery::{list_serial_ports, select_serial_port, SerialPortDescriptor};
pub use framer::{read_frame, unwrap, wrap, Frame, FrameKind, VALUE_SENTINEL};
pub use transport::{
    open_serial_port, ConnectionState, SerialLink, Transport, BAUD_RATE, READ_TIMEOUT,
};
