//! Serial port enumeration and a line-oriented transport over `serialport`

use kozy_core::DeviceError;
use serialport::{SerialPort, SerialPortType};
use std::io::{self, BufRead, BufReader, Write};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to enumerate serial ports: {0}")]
    Enumerate(String),
    #[error("Failed to open {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<TransportError> for DeviceError {
    fn from(err: TransportError) -> Self {
        DeviceError::Transport(err.to_string())
    }
}

/// A serial-capable port as reported by the OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device path (e.g. "/dev/ttyACM0" or "COM3")
    pub path: String,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub serial_number: Option<String>,
    pub product: Option<String>,
}

impl PortInfo {
    /// A port with no USB identity (e.g. a built-in UART)
    pub fn bare(path: &str) -> Self {
        Self {
            path: path.to_string(),
            vendor_id: None,
            product_id: None,
            serial_number: None,
            product: None,
        }
    }

    pub fn usb(path: &str, vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id: Some(vendor_id),
            product_id: Some(product_id),
            ..Self::bare(path)
        }
    }
}

impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(info: serialport::SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                path: info.port_name,
                vendor_id: Some(usb.vid),
                product_id: Some(usb.pid),
                serial_number: usb.serial_number,
                product: usb.product,
            },
            _ => Self::bare(&info.port_name),
        }
    }
}

/// An open, line-delimited byte stream. Dropping it releases the port.
pub trait LineTransport: Send {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Read up to and including the next newline.
    ///
    /// Returns whatever arrived (possibly an empty string) when the per-read
    /// timeout elapses first.
    fn read_line(&mut self) -> io::Result<String>;
}

/// Source of serial ports
pub trait SerialBackend: Send + Sync {
    fn list_ports(&self) -> Result<Vec<PortInfo>, TransportError>;

    fn open(
        &self,
        path: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn LineTransport>, TransportError>;
}

/// The host's real serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerial;

impl SerialBackend for SystemSerial {
    fn list_ports(&self) -> Result<Vec<PortInfo>, TransportError> {
        let ports = serialport::available_ports()
            .map_err(|e| TransportError::Enumerate(e.to_string()))?;
        debug!("Enumerated {} serial ports", ports.len());
        Ok(ports.into_iter().map(PortInfo::from).collect())
    }

    fn open(
        &self,
        path: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn LineTransport>, TransportError> {
        let port = serialport::new(path, baud_rate)
            .timeout(read_timeout)
            .open()
            .map_err(|e| TransportError::Open {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        debug!(port = %path, baud = baud_rate, "Serial port opened");
        Ok(Box::new(SerialLineTransport::new(port)))
    }
}

/// Line transport over an open serial port
pub struct SerialLineTransport {
    reader: BufReader<Box<dyn SerialPort>>,
}

impl SerialLineTransport {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            reader: BufReader::new(port),
        }
    }
}

impl LineTransport for SerialLineTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        trace!(bytes = bytes.len(), "Serial write");
        self.reader.get_mut().write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.reader.get_mut().flush()
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf) {
            Ok(_) => {}
            // Partial data read before the timeout stays in buf
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
            Err(e) => return Err(e),
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
