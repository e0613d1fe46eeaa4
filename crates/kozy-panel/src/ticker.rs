//! Periodic tick source for the capture session

use crate::controller::Command;
use kozy_capture::{TickHandle, TickScheduler};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

/// One pending tick. The ticker sends nothing new while a token is alive,
/// so at most one tick is queued or being handled at any time.
#[derive(Debug)]
pub struct TickToken {
    pub generation: u64,
    in_flight: Arc<AtomicBool>,
}

impl TickToken {
    pub fn new(generation: u64, in_flight: Arc<AtomicBool>) -> Self {
        in_flight.store(true, Ordering::Release);
        Self {
            generation,
            in_flight,
        }
    }
}

impl Drop for TickToken {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Posts `Command::Tick` to the controller queue from a tokio interval task
pub struct TokioTicker {
    runtime: Handle,
    commands: mpsc::Sender<Command>,
}

impl TokioTicker {
    pub fn new(runtime: Handle, commands: mpsc::Sender<Command>) -> Self {
        Self { runtime, commands }
    }
}

impl TickScheduler for TokioTicker {
    fn arm(&mut self, period: Duration, generation: u64) -> Box<dyn TickHandle> {
        // tokio intervals reject a zero period
        let period = period.max(Duration::from_millis(1));
        let commands = self.commands.clone();
        let in_flight = Arc::new(AtomicBool::new(false));

        let task = self.runtime.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                if in_flight.load(Ordering::Acquire) {
                    trace!(generation, "Previous tick still pending, skipping");
                    continue;
                }
                let token = TickToken::new(generation, in_flight.clone());
                if commands.send(Command::Tick(token)).await.is_err() {
                    break;
                }
            }
        });

        Box::new(TickerHandle { task })
    }
}

struct TickerHandle {
    task: JoinHandle<()>,
}

impl TickHandle for TickerHandle {
    fn disarm(&mut self) {
        self.task.abort();
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
