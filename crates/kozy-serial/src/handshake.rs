//! Bounded-time request/response handshake over a line transport
//!
//! The host sends a request token and then reads lines until one starts with
//! the expected prefix or the overall deadline passes. Boot banners and other
//! noise are logged and skipped; they never extend the deadline.

use kozy_core::DeviceError;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::transport::LineTransport;

/// Request token understood by the rig firmware
pub const DEFAULT_REQUEST: &str = "GET_CODE";

/// Prefix of the firmware's reply line
pub const DEFAULT_RESPONSE_PREFIX: &str = "CODE:";

/// Default overall handshake deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// Request token, sent followed by a newline
    pub request: String,
    pub response_prefix: String,
    /// Overall deadline, independent of the transport's per-read timeout
    pub timeout: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            request: DEFAULT_REQUEST.to_string(),
            response_prefix: DEFAULT_RESPONSE_PREFIX.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Result of one request/response exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Payload following the response prefix
    Success(String),
    /// Nothing at all arrived before the deadline
    Timeout,
    TransportError(String),
    /// Only non-matching lines arrived before the deadline
    UnexpectedData(Vec<String>),
}

impl HandshakeOutcome {
    pub fn code(self) -> Option<String> {
        match self {
            Self::Success(code) => Some(code),
            _ => None,
        }
    }

    pub fn into_result(self, timeout: Duration) -> Result<String, DeviceError> {
        match self {
            Self::Success(code) => Ok(code),
            Self::Timeout => Err(DeviceError::Timeout(timeout)),
            Self::TransportError(msg) => Err(DeviceError::Transport(msg)),
            Self::UnexpectedData(lines) => Err(DeviceError::UnexpectedData(lines)),
        }
    }
}

/// Send the request and wait for a prefixed reply
pub fn handshake(transport: &mut dyn LineTransport, config: &HandshakeConfig) -> HandshakeOutcome {
    let request = format!("{}\n", config.request);
    if let Err(e) = transport
        .write_all(request.as_bytes())
        .and_then(|_| transport.flush())
    {
        return HandshakeOutcome::TransportError(e.to_string());
    }
    debug!(request = %config.request, "Handshake request sent");

    let start = Instant::now();
    let mut unexpected = Vec::new();

    while start.elapsed() < config.timeout {
        let line = match transport.read_line() {
            Ok(line) => line,
            Err(e) => return HandshakeOutcome::TransportError(e.to_string()),
        };
        let line = line.trim();

        if let Some(payload) = line.strip_prefix(config.response_prefix.as_str()) {
            info!(code = %payload, "Handshake response received");
            return HandshakeOutcome::Success(payload.to_string());
        } else if !line.is_empty() {
            warn!(line = %line, "Unexpected data during handshake");
            unexpected.push(line.to_string());
        }
    }

    if unexpected.is_empty() {
        HandshakeOutcome::Timeout
    } else {
        HandshakeOutcome::UnexpectedData(unexpected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::thread::sleep;

    /// Replays scripted lines, then either repeats the last one or goes quiet
    struct ScriptedTransport {
        lines: VecDeque<String>,
        repeat: Option<String>,
        read_delay: Duration,
        written: Vec<u8>,
        flushed: bool,
        fail_write: bool,
    }

    impl ScriptedTransport {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|l| l.to_string()).collect(),
                repeat: None,
                read_delay: Duration::from_millis(5),
                written: Vec::new(),
                flushed: false,
                fail_write: false,
            }
        }

        fn repeating(line: &str) -> Self {
            Self {
                repeat: Some(line.to_string()),
                ..Self::new(&[])
            }
        }
    }

    impl LineTransport for ScriptedTransport {
        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            if self.fail_write {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
            }
            self.written.extend_from_slice(bytes);
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushed = true;
            Ok(())
        }

        fn read_line(&mut self) -> io::Result<String> {
            sleep(self.read_delay);
            Ok(self
                .lines
                .pop_front()
                .or_else(|| self.repeat.clone())
                .unwrap_or_default())
        }
    }

    fn config(timeout_ms: u64) -> HandshakeConfig {
        HandshakeConfig {
            timeout: Duration::from_millis(timeout_ms),
            ..HandshakeConfig::default()
        }
    }

    #[test]
    fn test_code_after_boot_noise() {
        let mut transport = ScriptedTransport::new(&["BOOT\n", "BOOT\n", "CODE:482193\n"]);
        let outcome = handshake(&mut transport, &config(1000));
        assert_eq!(outcome, HandshakeOutcome::Success("482193".to_string()));
        assert_eq!(transport.written, b"GET_CODE\n");
        assert!(transport.flushed);
    }

    #[test]
    fn test_repeating_noise_times_out() {
        let mut transport = ScriptedTransport::repeating("BOOT\n");
        let start = Instant::now();
        let outcome = handshake(&mut transport, &config(60));
        assert!(start.elapsed() >= Duration::from_millis(60));
        match &outcome {
            HandshakeOutcome::UnexpectedData(lines) => {
                assert!(!lines.is_empty());
                assert!(lines.iter().all(|l| l == "BOOT"));
            }
            other => panic!("expected UnexpectedData, got {:?}", other),
        }
        assert_eq!(outcome.code(), None);
    }

    #[test]
    fn test_silence_times_out() {
        let mut transport = ScriptedTransport::new(&[]);
        assert_eq!(
            handshake(&mut transport, &config(30)),
            HandshakeOutcome::Timeout
        );
    }

    #[test]
    fn test_write_failure_is_transport_error() {
        let mut transport = ScriptedTransport::new(&["CODE:1\n"]);
        transport.fail_write = true;
        let outcome = handshake(&mut transport, &config(100));
        assert!(matches!(outcome, HandshakeOutcome::TransportError(_)));
    }

    #[test]
    fn test_outcome_into_result() {
        let timeout = Duration::from_secs(3);
        assert_eq!(
            HandshakeOutcome::Success("42".into()).into_result(timeout),
            Ok("42".to_string())
        );
        assert_eq!(
            HandshakeOutcome::Timeout.into_result(timeout),
            Err(DeviceError::Timeout(timeout))
        );
    }
}
