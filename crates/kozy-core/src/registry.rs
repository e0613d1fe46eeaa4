//! Registry of control panel modules
//!
//! Each entry is keyed by a stable [`ModuleId`] and carries its own typed
//! state, so the panel never has to look modules up by their display label.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::{ModuleId, Severity, StatusReport, UsbIdentity};
use crate::frame::StreamConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Module '{0}' is already registered")]
    Duplicate(ModuleId),
    #[error("Module '{0}' is not registered")]
    Unknown(ModuleId),
}

/// Typed state for each kind of module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleKind {
    DepthCamera {
        stream: StreamConfig,
        streaming: bool,
    },
    /// Placeholder: no servo protocol exists yet
    ServoDrives { initialized: bool },
    Microcontroller {
        identity: UsbIdentity,
        code: Option<String>,
    },
}

impl ModuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DepthCamera { .. } => "depth camera",
            Self::ServoDrives { .. } => "servo drives",
            Self::Microcontroller { .. } => "microcontroller",
        }
    }
}

/// A registered module and its latest status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub id: ModuleId,
    /// Human-readable panel title
    pub label: String,
    pub kind: ModuleKind,
    pub status: String,
    pub severity: Severity,
}

impl ModuleEntry {
    pub fn new(id: ModuleId, label: impl Into<String>, kind: ModuleKind) -> Self {
        Self {
            id,
            label: label.into(),
            kind,
            status: "Unknown".to_string(),
            severity: Severity::Info,
        }
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport::new(self.id.clone(), self.status.clone(), self.severity)
    }
}

/// Ordered set of modules; order is registration order
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    entries: Vec<ModuleEntry>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The rig's standard panel: depth camera, servo drives, microcontroller
    pub fn standard(stream: StreamConfig, identity: UsbIdentity) -> Self {
        let mut registry = Self::new();
        registry.entries = vec![
            ModuleEntry::new(
                ModuleId::camera(),
                "RealSense D415",
                ModuleKind::DepthCamera {
                    stream,
                    streaming: false,
                },
            ),
            ModuleEntry::new(
                ModuleId::servo(),
                "Servo Drives",
                ModuleKind::ServoDrives { initialized: false },
            ),
            ModuleEntry::new(
                ModuleId::microcontroller(),
                "RPi Pico",
                ModuleKind::Microcontroller {
                    identity,
                    code: None,
                },
            ),
        ];
        registry
    }

    pub fn add(&mut self, entry: ModuleEntry) -> Result<(), RegistryError> {
        if self.contains(&entry.id) {
            return Err(RegistryError::Duplicate(entry.id));
        }
        tracing::debug!(module = %entry.id, kind = entry.kind.name(), "Module registered");
        self.entries.push(entry);
        Ok(())
    }

    pub fn remove(&mut self, id: &ModuleId) -> Result<ModuleEntry, RegistryError> {
        let index = self
            .entries
            .iter()
            .position(|e| &e.id == id)
            .ok_or_else(|| RegistryError::Unknown(id.clone()))?;
        Ok(self.entries.remove(index))
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.entries.iter().any(|e| &e.id == id)
    }

    pub fn get(&self, id: &ModuleId) -> Option<&ModuleEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    pub fn get_mut(&mut self, id: &ModuleId) -> Option<&mut ModuleEntry> {
        self.entries.iter_mut().find(|e| &e.id == id)
    }

    /// Record a new status; returns the report to forward, or None if the
    /// module is not registered
    pub fn set_status(
        &mut self,
        id: &ModuleId,
        text: impl Into<String>,
        severity: Severity,
    ) -> Option<StatusReport> {
        let entry = self.get_mut(id)?;
        entry.status = text.into();
        entry.severity = severity;
        Some(entry.status_report())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_panel() {
        let registry =
            ModuleRegistry::standard(StreamConfig::default(), UsbIdentity::PICO_MICROPYTHON);
        let ids: Vec<&str> = registry.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["realsense", "servo", "pico"]);
        assert_eq!(
            registry.get(&ModuleId::servo()).unwrap().label,
            "Servo Drives"
        );
    }

    #[test]
    fn test_add_and_remove() {
        let mut registry = ModuleRegistry::new();
        let entry = ModuleEntry::new(
            ModuleId::new("servo-left"),
            "Left Servo",
            ModuleKind::ServoDrives { initialized: false },
        );
        registry.add(entry.clone()).unwrap();
        assert_eq!(
            registry.add(entry),
            Err(RegistryError::Duplicate(ModuleId::new("servo-left")))
        );

        let removed = registry.remove(&ModuleId::new("servo-left")).unwrap();
        assert_eq!(removed.label, "Left Servo");
        assert!(registry.is_empty());
        assert_eq!(
            registry.remove(&ModuleId::new("servo-left")),
            Err(RegistryError::Unknown(ModuleId::new("servo-left")))
        );
    }

    #[test]
    fn test_set_status() {
        let mut registry =
            ModuleRegistry::standard(StreamConfig::default(), UsbIdentity::PICO_MICROPYTHON);
        let report = registry
            .set_status(&ModuleId::microcontroller(), "Code: 482193", Severity::Good)
            .unwrap();
        assert_eq!(report.module, ModuleId::microcontroller());
        assert_eq!(report.text, "Code: 482193");
        assert_eq!(
            registry.get(&ModuleId::microcontroller()).unwrap().severity,
            Severity::Good
        );
        assert!(registry
            .set_status(&ModuleId::new("missing"), "x", Severity::Info)
            .is_none());
    }
}
