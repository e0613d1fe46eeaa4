//! Microcontroller discovery and identification handshake

use kozy_core::{DeviceDescriptor, DeviceError, DiscoveryResult, UsbIdentity};
use kozy_serial::{handshake, HandshakeConfig, PortInfo, SerialBackend, TransportError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Serial link settings for a microcontroller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrocontrollerProfile {
    pub identity: UsbIdentity,
    pub baud_rate: u32,
    /// Timeout for a single line read
    pub read_timeout: Duration,
    pub request: String,
    pub response_prefix: String,
}

impl Default for MicrocontrollerProfile {
    fn default() -> Self {
        Self {
            identity: UsbIdentity::PICO_MICROPYTHON,
            baud_rate: 115_200,
            read_timeout: Duration::from_secs(1),
            request: kozy_serial::DEFAULT_REQUEST.to_string(),
            response_prefix: kozy_serial::DEFAULT_RESPONSE_PREFIX.to_string(),
        }
    }
}

impl MicrocontrollerProfile {
    fn handshake_config(&self, timeout: Duration) -> HandshakeConfig {
        HandshakeConfig {
            request: self.request.clone(),
            response_prefix: self.response_prefix.clone(),
            timeout,
        }
    }
}

/// First port whose USB identity matches
pub fn find_device_port(
    backend: &dyn SerialBackend,
    identity: &UsbIdentity,
) -> Result<Option<PortInfo>, TransportError> {
    let ports = backend.list_ports()?;
    debug!(identity = %identity, candidates = ports.len(), "Searching serial ports");
    Ok(ports
        .into_iter()
        .find(|p| identity.matches(p.vendor_id, p.product_id)))
}

/// Look for the microcontroller without opening it
pub fn detect_microcontroller(
    backend: &dyn SerialBackend,
    identity: &UsbIdentity,
) -> DiscoveryResult {
    match find_device_port(backend, identity) {
        Ok(Some(port)) => DiscoveryResult::Found(DeviceDescriptor::Serial {
            path: port.path,
            identity: *identity,
        }),
        Ok(None) => DiscoveryResult::NotFound,
        Err(e) => {
            error!(error = %e, "Serial port enumeration failed");
            DiscoveryResult::DetectionError(e.to_string())
        }
    }
}

/// Find the microcontroller, open it, and request its identification code.
///
/// The transport is opened only if a matching port exists and is released
/// before returning on every path.
pub fn handshake_device(
    backend: &dyn SerialBackend,
    profile: &MicrocontrollerProfile,
    timeout: Duration,
) -> Result<String, DeviceError> {
    let port = match find_device_port(backend, &profile.identity) {
        Ok(Some(port)) => port,
        Ok(None) => {
            warn!(identity = %profile.identity, "Microcontroller not found");
            return Err(DeviceError::NotFound);
        }
        Err(e) => {
            error!(error = %e, "Failed to communicate with microcontroller");
            return Err(e.into());
        }
    };

    let mut transport = backend
        .open(&port.path, profile.baud_rate, profile.read_timeout)
        .map_err(|e| {
            error!(port = %port.path, error = %e, "Failed to communicate with microcontroller");
            DeviceError::from(e)
        })?;
    info!(port = %port.path, "Connected to microcontroller");

    let outcome = handshake(transport.as_mut(), &profile.handshake_config(timeout));
    drop(transport);

    outcome.into_result(timeout).map_err(|e| {
        match &e {
            DeviceError::Timeout(_) | DeviceError::UnexpectedData(_) => {
                warn!(port = %port.path, "Microcontroller did not respond with code in time")
            }
            _ => error!(port = %port.path, error = %e, "Failed to communicate with microcontroller"),
        }
        e
    })
}

/// Like [`handshake_device`], collapsing every failure to `None`
pub fn connect_device(
    backend: &dyn SerialBackend,
    profile: &MicrocontrollerProfile,
    timeout: Duration,
) -> Option<String> {
    handshake_device(backend, profile, timeout).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kozy_serial::LineTransport;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Backend that serves a fixed port list and records open attempts
    struct RecordingBackend {
        ports: Vec<PortInfo>,
        replies: Vec<String>,
        opened: Arc<Mutex<Vec<String>>>,
        released: Arc<Mutex<usize>>,
    }

    impl RecordingBackend {
        fn new(ports: Vec<PortInfo>, replies: &[&str]) -> Self {
            Self {
                ports,
                replies: replies.iter().map(|r| r.to_string()).collect(),
                opened: Arc::new(Mutex::new(Vec::new())),
                released: Arc::new(Mutex::new(0)),
            }
        }

        fn open_count(&self) -> usize {
            self.opened.lock().unwrap().len()
        }
    }

    struct FakeTransport {
        replies: VecDeque<String>,
        released: Arc<Mutex<usize>>,
    }

    impl LineTransport for FakeTransport {
        fn write_all(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn read_line(&mut self) -> io::Result<String> {
            match self.replies.pop_front() {
                Some(line) => Ok(line),
                None => {
                    std::thread::sleep(Duration::from_millis(5));
                    Ok(String::new())
                }
            }
        }
    }

    impl Drop for FakeTransport {
        fn drop(&mut self) {
            *self.released.lock().unwrap() += 1;
        }
    }

    impl SerialBackend for RecordingBackend {
        fn list_ports(&self) -> Result<Vec<PortInfo>, TransportError> {
            Ok(self.ports.clone())
        }

        fn open(
            &self,
            path: &str,
            _baud_rate: u32,
            _read_timeout: Duration,
        ) -> Result<Box<dyn LineTransport>, TransportError> {
            self.opened.lock().unwrap().push(path.to_string());
            Ok(Box::new(FakeTransport {
                replies: self.replies.iter().cloned().collect(),
                released: self.released.clone(),
            }))
        }
    }

    fn pico_port(path: &str) -> PortInfo {
        PortInfo::usb(path, 0x2E8A, 0x0005)
    }

    #[test]
    fn test_no_matching_port_opens_nothing() {
        let backend = RecordingBackend::new(
            vec![PortInfo::bare("/dev/ttyS0"), PortInfo::usb("/dev/ttyUSB0", 0x0403, 0x6001)],
            &["CODE:111111\n"],
        );
        let profile = MicrocontrollerProfile::default();
        assert_eq!(
            connect_device(&backend, &profile, Duration::from_millis(100)),
            None
        );
        assert_eq!(backend.open_count(), 0);
    }

    #[test]
    fn test_connect_returns_code() {
        let backend = RecordingBackend::new(
            vec![PortInfo::bare("/dev/ttyS0"), pico_port("/dev/ttyACM0")],
            &["BOOT\n", "BOOT\n", "CODE:482193\n"],
        );
        let profile = MicrocontrollerProfile::default();
        let code = connect_device(&backend, &profile, Duration::from_secs(1));
        assert_eq!(code.as_deref(), Some("482193"));
        assert_eq!(*backend.opened.lock().unwrap(), vec!["/dev/ttyACM0".to_string()]);
        assert_eq!(*backend.released.lock().unwrap(), 1);
    }

    #[test]
    fn test_silent_device_times_out_and_releases() {
        let backend = RecordingBackend::new(vec![pico_port("/dev/ttyACM0")], &[]);
        let profile = MicrocontrollerProfile::default();
        let timeout = Duration::from_millis(40);
        assert_eq!(
            handshake_device(&backend, &profile, timeout),
            Err(DeviceError::Timeout(timeout))
        );
        assert_eq!(*backend.released.lock().unwrap(), 1);
    }

    #[test]
    fn test_not_found_error_kind() {
        let backend = RecordingBackend::new(vec![], &[]);
        let profile = MicrocontrollerProfile::default();
        assert_eq!(
            handshake_device(&backend, &profile, Duration::from_millis(10)),
            Err(DeviceError::NotFound)
        );
    }

    #[test]
    fn test_detect_microcontroller() {
        let backend = RecordingBackend::new(vec![pico_port("/dev/ttyACM1")], &[]);
        let identity = UsbIdentity::PICO_MICROPYTHON;
        assert_eq!(
            detect_microcontroller(&backend, &identity),
            DiscoveryResult::Found(DeviceDescriptor::Serial {
                path: "/dev/ttyACM1".to_string(),
                identity,
            })
        );
        assert_eq!(backend.open_count(), 0);
    }
}
