//! Shared panel context handed to each component at construction

use kozy_capture::FrameSink;
use kozy_core::{Channel, DisplayImage, ModuleEntry, StatusReport};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events for the presentation layer
#[derive(Debug, Clone)]
pub enum PanelEvent {
    /// A module's status changed
    Status(StatusReport),
    /// A new image replaces the previous one for this channel
    Image {
        channel: Channel,
        image: Arc<DisplayImage>,
    },
    /// Snapshot of the module registry
    Modules(Vec<ModuleEntry>),
}

/// Explicit replacement for process-wide state: components publish through
/// the context they were given instead of reaching for globals
#[derive(Debug, Clone)]
pub struct PanelContext {
    events: broadcast::Sender<PanelEvent>,
}

impl PanelContext {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self { events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.events.subscribe()
    }

    pub fn publish(&self, event: PanelEvent) {
        // No subscribers is fine (e.g. headless tests)
        let _ = self.events.send(event);
    }

    pub fn publish_status(&self, report: StatusReport) {
        self.publish(PanelEvent::Status(report));
    }
}

impl Default for PanelContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame sink that forwards converted images as panel events
pub struct EventSink<'a>(pub &'a PanelContext);

impl FrameSink for EventSink<'_> {
    fn present(&mut self, channel: Channel, image: DisplayImage) {
        self.0.publish(PanelEvent::Image {
            channel,
            image: Arc::new(image),
        });
    }
}
