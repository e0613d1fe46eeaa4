//! Kozy Capture - Camera streaming for the control panel
//!
//! This crate provides:
//! - The capture session state machine (start, per-tick acquire, stop)
//! - Conversion of color and depth frames into display images
//! - A simulated depth camera for running without hardware

pub mod convert;
pub mod session;
pub mod simulated;

pub use convert::{
    convert_color, convert_depth, convert_frame, depth_to_display, DEFAULT_MAX_DEPTH_MM,
};
pub use session::{
    CaptureSession, FrameSink, SessionError, SessionState, SessionStats, TickHandle, TickOutcome,
    TickScheduler,
};
pub use simulated::SimulatedCamera;
