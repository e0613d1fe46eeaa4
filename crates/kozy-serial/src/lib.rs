//! Kozy Serial - Line transport and handshake for the rig microcontroller
//!
//! This crate wraps `serialport` behind a small backend trait so discovery can
//! be exercised without hardware, and implements the bounded-time
//! `GET_CODE` / `CODE:` handshake.

pub mod handshake;
pub mod transport;

pub use handshake::{
    handshake, HandshakeConfig, HandshakeOutcome, DEFAULT_REQUEST, DEFAULT_RESPONSE_PREFIX,
    DEFAULT_TIMEOUT,
};
pub use transport::{
    LineTransport, PortInfo, SerialBackend, SerialLineTransport, SystemSerial, TransportError,
};
