//! Panel controller.
//!
//! Owns the module registry and the capture session and handles one
//! command at a time on a dedicated blocking worker. Everything the
//! presentation layer sees leaves through the [`PanelContext`].

use crate::config::{load_config, save_config, Config, StreamSettings};
use crate::context::{EventSink, PanelContext, PanelEvent};
use crate::ticker::TickToken;
use kozy_capture::{CaptureSession, SessionError, SessionStats, TickScheduler};
use kozy_core::{
    CameraDriver, DiscoveryResult, ModuleEntry, ModuleId, ModuleKind, ModuleRegistry, Severity,
    StreamConfig,
};
use kozy_discovery::{detect_camera, detect_microcontroller, handshake_device};
use kozy_serial::SerialBackend;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Requests handled by the controller, in arrival order
#[derive(Debug)]
pub enum Command {
    /// Re-run discovery for every registered module
    DetectDevices,
    /// Handshake with the microcontroller, optionally overriding the timeout
    ConnectMicrocontroller { timeout: Option<Duration> },
    /// Start streaming with the current stream settings
    StartStream,
    StopStream,
    /// Replace the stream settings used by the next start
    SetStream(StreamConfig),
    SaveConfig,
    LoadConfig,
    InitServos,
    AddModule(ModuleEntry),
    RemoveModule(ModuleId),
    /// Publish a snapshot of the registry
    ListModules,
    /// Free-form console input
    Execute(String),
    Tick(TickToken),
    Shutdown,
}

pub struct Controller {
    ctx: PanelContext,
    config: Config,
    config_path: PathBuf,
    registry: ModuleRegistry,
    session: CaptureSession,
    serial: Arc<dyn SerialBackend>,
}

impl Controller {
    pub fn new(
        ctx: PanelContext,
        config: Config,
        config_path: PathBuf,
        driver: Option<Arc<dyn CameraDriver>>,
        serial: Arc<dyn SerialBackend>,
        scheduler: Box<dyn TickScheduler>,
    ) -> Self {
        let stream = config.stream_config().unwrap_or_else(|e| {
            warn!(error = %e, "Invalid stream settings, using defaults");
            StreamConfig::default()
        });
        let registry = ModuleRegistry::standard(stream, config.identity());
        let session =
            CaptureSession::new(driver, scheduler).with_max_depth_mm(config.camera.max_depth_mm);

        Self {
            ctx,
            config,
            config_path,
            registry,
            session,
            serial,
        }
    }

    /// Process commands until `Shutdown` or until every sender is gone
    pub fn run(mut self, mut commands: mpsc::Receiver<Command>) -> SessionStats {
        while let Some(command) = commands.blocking_recv() {
            if self.handle(command).is_break() {
                break;
            }
        }
        let stats = self.session.stats();
        self.shutdown();
        stats
    }

    pub fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::DetectDevices => self.detect_devices(),
            Command::ConnectMicrocontroller { timeout } => self.connect_microcontroller(timeout),
            Command::StartStream => self.start_stream(),
            Command::StopStream => self.stop_stream(),
            Command::SetStream(stream) => self.set_stream(stream),
            Command::SaveConfig => match save_config(&self.config_path, &self.config) {
                Ok(()) => info!(path = %self.config_path.display(), "Configuration saved"),
                Err(e) => error!(error = %e, "Failed to save configuration"),
            },
            Command::LoadConfig => {
                let loaded = load_config(&self.config_path);
                match loaded.stream_config() {
                    Ok(stream) => {
                        self.set_stream(stream);
                        info!("Configuration loaded");
                    }
                    Err(e) => error!(error = %e, "Configuration has invalid stream settings"),
                }
            }
            Command::InitServos => self.init_servos(),
            Command::AddModule(entry) => {
                let report = entry.status_report();
                match self.registry.add(entry) {
                    Ok(()) => self.ctx.publish_status(report),
                    Err(e) => warn!(error = %e, "Cannot add module"),
                }
            }
            Command::RemoveModule(id) => self.remove_module(&id),
            Command::ListModules => self
                .ctx
                .publish(PanelEvent::Modules(self.registry.iter().cloned().collect())),
            Command::Execute(text) => info!("cmd: {}", text),
            Command::Tick(token) => {
                self.session.tick(token.generation, &mut EventSink(&self.ctx));
            }
            Command::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Stop any active session before the controller goes away
    pub fn shutdown(&mut self) {
        if self.session.stop() {
            self.mark_streaming(false);
        }
        info!("system shutdown");
    }

    fn set_status(&mut self, id: &ModuleId, text: impl Into<String>, severity: Severity) {
        match self.registry.set_status(id, text, severity) {
            Some(report) => self.ctx.publish_status(report),
            None => debug!(module = %id, "Status for unregistered module dropped"),
        }
    }

    fn modules_of(&self, pred: impl Fn(&ModuleKind) -> bool) -> Vec<ModuleId> {
        self.registry
            .iter()
            .filter(|e| pred(&e.kind))
            .map(|e| e.id.clone())
            .collect()
    }

    fn detect_devices(&mut self) {
        info!("Detecting devices...");
        let camera = detect_camera(self.session.driver());
        if let DiscoveryResult::DetectionError(reason) = &camera {
            error!(reason = %reason, "Camera detection error");
        }
        let (text, severity) = camera.status();
        for id in self.modules_of(|k| matches!(k, ModuleKind::DepthCamera { .. })) {
            self.set_status(&id, text.clone(), severity);
        }

        for id in self.modules_of(|k| matches!(k, ModuleKind::ServoDrives { .. })) {
            self.set_status(&id, "Unknown", Severity::Warning);
        }

        let microcontrollers: Vec<_> = self
            .registry
            .iter()
            .filter_map(|e| match &e.kind {
                ModuleKind::Microcontroller { identity, .. } => Some((e.id.clone(), *identity)),
                _ => None,
            })
            .collect();
        for (id, identity) in microcontrollers {
            if let DiscoveryResult::Found(device) =
                detect_microcontroller(self.serial.as_ref(), &identity)
            {
                debug!(module = %id, device = ?device, "Microcontroller present");
            }
            if let Some(ModuleKind::Microcontroller { code, .. }) =
                self.registry.get_mut(&id).map(|e| &mut e.kind)
            {
                *code = None;
            }
            self.set_status(&id, "Disconnected", Severity::Warning);
        }
    }

    fn connect_microcontroller(&mut self, timeout: Option<Duration>) {
        let id = ModuleId::microcontroller();
        let mut profile = self.config.microcontroller_profile();
        if let Some(ModuleKind::Microcontroller { identity, .. }) =
            self.registry.get(&id).map(|e| &e.kind)
        {
            profile.identity = *identity;
        }
        let timeout = timeout.unwrap_or_else(|| self.config.handshake_timeout());

        self.set_status(&id, "Connecting...", Severity::Warning);
        let result = handshake_device(self.serial.as_ref(), &profile, timeout);

        let code = result.ok();
        if let Some(ModuleKind::Microcontroller { code: slot, .. }) =
            self.registry.get_mut(&id).map(|e| &mut e.kind)
        {
            *slot = code.clone();
        }
        match code {
            Some(code) => {
                info!(code = %code, "Microcontroller identified");
                self.set_status(&id, format!("Code: {}", code), Severity::Good);
            }
            None => self.set_status(&id, "Failed", Severity::Error),
        }
    }

    fn start_stream(&mut self) {
        let id = ModuleId::camera();
        let stream = match self.config.stream_config() {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "Invalid stream settings");
                self.set_status(&id, "Start failed", Severity::Error);
                return;
            }
        };

        match self.session.start(stream) {
            Ok(_) => {
                self.mark_streaming(true);
                self.set_status(&id, "Streaming", Severity::Good);
            }
            // The running stream is untouched, so its status stays
            Err(SessionError::AlreadyStreaming(_)) => {}
            Err(_) => self.set_status(&id, "Start failed", Severity::Error),
        }
    }

    fn stop_stream(&mut self) {
        if self.session.stop() {
            self.mark_streaming(false);
            self.set_status(&ModuleId::camera(), "Stopped", Severity::Warning);
        } else {
            debug!("Stop requested with no active stream");
        }
    }

    fn set_stream(&mut self, stream: StreamConfig) {
        self.config.stream = StreamSettings::from(stream);
        if let Some(ModuleKind::DepthCamera { stream: slot, .. }) =
            self.registry.get_mut(&ModuleId::camera()).map(|e| &mut e.kind)
        {
            *slot = stream;
        }
        info!(stream = %stream, "Stream settings updated");
    }

    fn mark_streaming(&mut self, active: bool) {
        let config = self.session.config();
        if let Some(ModuleKind::DepthCamera { stream, streaming }) =
            self.registry.get_mut(&ModuleId::camera()).map(|e| &mut e.kind)
        {
            *streaming = active;
            if let Some(config) = config {
                *stream = config;
            }
        }
    }

    fn init_servos(&mut self) {
        let ids = self.modules_of(|k| matches!(k, ModuleKind::ServoDrives { .. }));
        if ids.is_empty() {
            warn!("No servo drives registered");
        }
        for id in ids {
            if let Some(ModuleKind::ServoDrives { initialized }) =
                self.registry.get_mut(&id).map(|e| &mut e.kind)
            {
                *initialized = true;
            }
            info!(module = %id, "Servo drives initialized");
            self.set_status(&id, "Initialized", Severity::Good);
        }
    }

    fn remove_module(&mut self, id: &ModuleId) {
        let is_camera = matches!(
            self.registry.get(id).map(|e| &e.kind),
            Some(ModuleKind::DepthCamera { .. })
        );
        if is_camera && self.session.stop() {
            info!(module = %id, "Stopped stream of removed module");
        }
        match self.registry.remove(id) {
            Ok(entry) => info!(module = %entry.id, label = %entry.label, "Module removed"),
            Err(e) => warn!(error = %e, "Cannot remove module"),
        }
    }
}
