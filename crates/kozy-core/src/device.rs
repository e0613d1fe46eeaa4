//! Device identities, discovery results, and status reports

use serde::{Deserialize, Serialize};

/// Stable identifier for a control panel module (e.g. "realsense")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(pub String);

impl ModuleId {
    pub const CAMERA: &'static str = "realsense";
    pub const SERVO: &'static str = "servo";
    pub const MICROCONTROLLER: &'static str = "pico";

    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn camera() -> Self {
        Self::new(Self::CAMERA)
    }

    pub fn servo() -> Self {
        Self::new(Self::SERVO)
    }

    pub fn microcontroller() -> Self {
        Self::new(Self::MICROCONTROLLER)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// USB vendor/product pair used to recognise a serial device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsbIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl UsbIdentity {
    /// Raspberry Pi Pico running MicroPython (CDC serial)
    pub const PICO_MICROPYTHON: Self = Self {
        vendor_id: 0x2E8A,
        product_id: 0x0005,
    };

    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    /// Check whether a port's reported ids match this identity
    pub fn matches(&self, vendor_id: Option<u16>, product_id: Option<u16>) -> bool {
        vendor_id == Some(self.vendor_id) && product_id == Some(self.product_id)
    }
}

impl Default for UsbIdentity {
    fn default() -> Self {
        Self::PICO_MICROPYTHON
    }
}

impl std::fmt::Display for UsbIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// Name and serial number reported by the camera driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub name: String,
    pub serial: String,
}

/// What a successful discovery found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceDescriptor {
    /// A capture device identified by the driver
    Camera(CameraInfo),
    /// A serial device reachable at a port path
    Serial { path: String, identity: UsbIdentity },
}

/// Outcome of a single discovery attempt. Produced fresh on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryResult {
    /// Driver present, but no matching device
    NotFound,
    /// The driver/SDK needed to enumerate devices is not available
    DriverMissing,
    /// Enumeration itself failed
    DetectionError(String),
    Found(DeviceDescriptor),
}

impl DiscoveryResult {
    /// Status text and severity to show for this result
    pub fn status(&self) -> (String, Severity) {
        match self {
            Self::Found(DeviceDescriptor::Camera(info)) => {
                (format!("Connected ({})", info.serial), Severity::Good)
            }
            Self::Found(DeviceDescriptor::Serial { path, .. }) => {
                (format!("Found on {}", path), Severity::Good)
            }
            Self::NotFound => ("Not found".to_string(), Severity::Warning),
            Self::DriverMissing => ("Driver missing".to_string(), Severity::Error),
            Self::DetectionError(_) => ("Detection error".to_string(), Severity::Warning),
        }
    }
}

/// How a status should be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Neutral, nothing known yet
    Info,
    Good,
    /// Pending or degraded
    Warning,
    Error,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Info
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Good => "ok",
            Self::Warning => "warn",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// A status update for one module, sent to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub module: ModuleId,
    pub text: String,
    pub severity: Severity,
}

impl StatusReport {
    pub fn new(module: ModuleId, text: impl Into<String>, severity: Severity) -> Self {
        Self {
            module,
            text: text.into(),
            severity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usb_identity_matches() {
        let pico = UsbIdentity::PICO_MICROPYTHON;
        assert!(pico.matches(Some(0x2E8A), Some(0x0005)));
        assert!(!pico.matches(Some(0x2E8A), Some(0x000A)));
        assert!(!pico.matches(None, None));
        assert_eq!(pico.to_string(), "2e8a:0005");
    }

    #[test]
    fn test_discovery_status() {
        let found = DiscoveryResult::Found(DeviceDescriptor::Camera(CameraInfo {
            name: "Intel RealSense D415".to_string(),
            serial: "821312060313".to_string(),
        }));
        assert_eq!(
            found.status(),
            ("Connected (821312060313)".to_string(), Severity::Good)
        );
        assert_eq!(DiscoveryResult::DriverMissing.status().1, Severity::Error);
        assert_eq!(DiscoveryResult::NotFound.status().1, Severity::Warning);
        assert_eq!(
            DiscoveryResult::DetectionError("boom".into()).status().0,
            "Detection error"
        );
    }
}
