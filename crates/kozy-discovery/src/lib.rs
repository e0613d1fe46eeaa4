//! Kozy Discovery - Finding the rig's devices
//!
//! This crate provides the two discovery paths:
//! - Depth camera detection through the camera driver boundary
//! - Microcontroller lookup by USB identity plus the identification handshake
//!
//! Both recover every failure at the boundary and hand back a plain value.

pub mod camera;
pub mod microcontroller;

pub use camera::detect_camera;
pub use microcontroller::{
    connect_device, detect_microcontroller, find_device_port, handshake_device,
    MicrocontrollerProfile,
};
