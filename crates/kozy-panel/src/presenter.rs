//! Terminal presentation of panel events

use crate::context::PanelEvent;
use kozy_core::{Channel, DisplayImage, ModuleEntry, StatusReport};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// What the presenter saw by the time the event stream closed
#[derive(Debug, Default)]
pub struct Presenter {
    statuses: Vec<StatusReport>,
    latest: HashMap<Channel, Arc<DisplayImage>>,
    images: HashMap<Channel, u64>,
}

impl Presenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: PanelEvent) {
        match event {
            PanelEvent::Status(report) => {
                println!("{}", status_line(&report));
                self.statuses.push(report);
            }
            PanelEvent::Image { channel, image } => {
                let count = self.images.entry(channel).or_default();
                *count += 1;
                if *count == 1 {
                    debug!(
                        channel = %channel,
                        width = image.width,
                        height = image.height,
                        "First image received"
                    );
                }
                // Newest image replaces the previous one
                self.latest.insert(channel, image);
            }
            PanelEvent::Modules(entries) => {
                for entry in &entries {
                    println!("{}", module_line(entry));
                }
            }
        }
    }

    pub fn statuses(&self) -> &[StatusReport] {
        &self.statuses
    }

    pub fn latest(&self, channel: Channel) -> Option<&DisplayImage> {
        self.latest.get(&channel).map(|image| image.as_ref())
    }

    pub fn image_count(&self, channel: Channel) -> u64 {
        self.images.get(&channel).copied().unwrap_or(0)
    }
}

pub fn status_line(report: &StatusReport) -> String {
    format!(
        "[{:<5}] {:<9} {}",
        report.severity.to_string(),
        report.module.as_str(),
        report.text
    )
}

pub fn module_line(entry: &ModuleEntry) -> String {
    format!(
        "{:<9} {:<16} {:<15} {} ({})",
        entry.id.as_str(),
        entry.label,
        entry.kind.name(),
        entry.status,
        entry.severity
    )
}

/// Drain events until every publisher is gone
pub async fn run(mut events: broadcast::Receiver<PanelEvent>) -> Presenter {
    let mut presenter = Presenter::new();
    loop {
        match events.recv().await {
            Ok(event) => presenter.apply(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Presenter lagging, events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
    presenter
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PanelContext;
    use kozy_core::{ModuleId, PixelFormat, Severity};

    fn gray(value: u8) -> Arc<DisplayImage> {
        Arc::new(DisplayImage {
            width: 1,
            height: 1,
            format: PixelFormat::Gray8,
            data: vec![value],
        })
    }

    #[test]
    fn test_status_line() {
        let report = StatusReport::new(ModuleId::microcontroller(), "Code: 482193", Severity::Good);
        assert_eq!(status_line(&report), "[ok   ] pico      Code: 482193");
    }

    #[tokio::test]
    async fn test_keeps_latest_image_per_channel() {
        let ctx = PanelContext::new();
        let events = ctx.subscribe();

        ctx.publish(PanelEvent::Image {
            channel: Channel::Depth,
            image: gray(10),
        });
        ctx.publish(PanelEvent::Image {
            channel: Channel::Depth,
            image: gray(20),
        });
        ctx.publish_status(StatusReport::new(ModuleId::camera(), "Stopped", Severity::Warning));
        drop(ctx);

        let presenter = run(events).await;
        assert_eq!(presenter.image_count(Channel::Depth), 2);
        assert_eq!(presenter.image_count(Channel::Color), 0);
        assert_eq!(presenter.latest(Channel::Depth).unwrap().data, vec![20]);
        assert!(presenter.latest(Channel::Color).is_none());
        assert_eq!(presenter.statuses().len(), 1);
    }
}
