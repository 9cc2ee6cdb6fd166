//! Run-completed notifications.
//!
//! Delivery is best-effort: the workbench logs a failed publish and carries
//! on.

use cqmt_core::question::RunCompleted;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error)]
#[error("run event not delivered: {0}")]
pub struct PublishError(pub String);

/// Receives an event for every persisted run.
pub trait RunEventSink: Send + Sync {
  fn publish(&self, event: &RunCompleted) -> Result<(), PublishError>;
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl RunEventSink for NoopSink {
  fn publish(&self, _event: &RunCompleted) -> Result<(), PublishError> { Ok(()) }
}

/// Fans events out to any number of in-process subscribers.
///
/// Slow subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
  sender: broadcast::Sender<RunCompleted>,
}

impl BroadcastSink {
  pub fn new(capacity: usize) -> Self {
    let (sender, _) = broadcast::channel(capacity.max(1));
    Self { sender }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<RunCompleted> { self.sender.subscribe() }
}

impl RunEventSink for BroadcastSink {
  fn publish(&self, event: &RunCompleted) -> Result<(), PublishError> {
    self
      .sender
      .send(event.clone())
      .map(|_| ())
      .map_err(|_| PublishError("no subscribers".into()))
  }
}
