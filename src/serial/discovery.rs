//! Serial port enumeration and selection by description.

use crate::error::{DeviceKind, HarnessError, Result};
use serialport::{SerialPortInfo, SerialPortType};

/// A serial port as seen during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortDescriptor {
    /// OS path used to open the port (`/dev/ttyACM0`, `COM3`, ...).
    pub port_name: String,
    /// Human-readable description the filter is matched against.
    pub description: String,
}

impl SerialPortDescriptor {
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
        }
    }

    fn from_info(info: SerialPortInfo) -> Self {
        let description = match &info.port_type {
            SerialPortType::UsbPort(usb) => usb
                .product
                .clone()
                .or_else(|| usb.manufacturer.clone())
                .unwrap_or_else(|| info.port_name.clone()),
            SerialPortType::BluetoothPort => format!("{} (bluetooth)", info.port_name),
            SerialPortType::PciPort | SerialPortType::Unknown => info.port_name.clone(),
        };
        Self {
            port_name: info.port_name,
            description,
        }
    }
}

/// List every serial port the OS reports.
pub fn list_serial_ports() -> Result<Vec<SerialPortDescriptor>> {
    let ports = serialport::available_ports().map_err(|err| HarnessError::ConnectionError {
        kind: DeviceKind::SerialPort,
        device: "<enumeration>".to_string(),
        reason: err.to_string(),
    })?;
    Ok(ports.into_iter().map(SerialPortDescriptor::from_info).collect())
}

/// First port whose description contains `filter` (case-sensitive).
pub fn select_serial_port<'a>(
    ports: &'a [SerialPortDescriptor],
    filter: &str,
) -> Option<&'a SerialPortDescriptor> {
    ports.iter().find(|port| port.description.contains(filter))
}
