//! Kozy Core - Shared types for the Kozy control panel
//!
//! This crate provides the plain data that crosses component boundaries:
//! - Device identities and discovery results for the camera and microcontroller
//! - Status reports with severities for the presentation layer
//! - Raw sensor frames, display images, and stream configuration
//! - The camera driver boundary (driver, pipeline)
//! - The error taxonomy shared by discovery, handshake, and capture
//! - The module registry that tracks control panel entries

pub mod device;
pub mod driver;
pub mod error;
pub mod frame;
pub mod registry;

pub use device::{
    CameraInfo, DeviceDescriptor, DiscoveryResult, ModuleId, Severity, StatusReport, UsbIdentity,
};
pub use driver::{CameraDriver, Pipeline};
pub use error::DeviceError;
pub use frame::{
    Channel, DisplayImage, Frame, FrameSet, PixelFormat, StreamConfig, StreamConfigError,
    StreamSpec, WireFormat,
};
pub use registry::{ModuleEntry, ModuleKind, ModuleRegistry, RegistryError};
