//! Depth camera discovery through the driver boundary

use kozy_core::{CameraDriver, DeviceDescriptor, DiscoveryResult};
use tracing::{error, info};

/// Detect a connected capture device.
///
/// `driver` is `None` when no SDK binding is available, which is reported
/// as [`DiscoveryResult::DriverMissing`]. Never fails outward.
pub fn detect_camera(driver: Option<&dyn CameraDriver>) -> DiscoveryResult {
    let Some(driver) = driver else {
        info!("Camera driver not available");
        return DiscoveryResult::DriverMissing;
    };

    match driver.enumerate_devices() {
        Ok(devices) => match devices.into_iter().next() {
            Some(device) => {
                info!(name = %device.name, serial = %device.serial, "Camera detected");
                DiscoveryResult::Found(DeviceDescriptor::Camera(device))
            }
            None => {
                info!("No camera connected");
                DiscoveryResult::NotFound
            }
        },
        Err(e) => {
            error!(error = %e, "Camera detection error");
            DiscoveryResult::DetectionError(e.to_string())
        }
    }
}
