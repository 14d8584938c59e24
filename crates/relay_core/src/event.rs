//! Run events for push-style observers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::run::{RunFailure, RunId};

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Events emitted while a run is driven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: RunId,
        pipeline_id: String,
        steps: usize,
    },
    StepStarted {
        run_id: RunId,
        step: usize,
        agent_id: String,
        input: String,
    },
    StepOutput {
        run_id: RunId,
        step: usize,
        delta: String,
    },
    StepCompleted {
        run_id: RunId,
        step: usize,
    },
    StepFailed {
        run_id: RunId,
        step: usize,
        error: String,
    },
    RunCompleted {
        run_id: RunId,
    },
    RunFailed {
        run_id: RunId,
        failure: RunFailure,
    },
    /// Stop was requested; `step` is the first step that did not finish.
    RunCancelled {
        run_id: RunId,
        step: usize,
    },
}

impl RunEvent {
    /// Run the event belongs to.
    pub fn run_id(&self) -> &str {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::StepStarted { run_id, .. }
            | Self::StepOutput { run_id, .. }
            | Self::StepCompleted { run_id, .. }
            | Self::StepFailed { run_id, .. }
            | Self::RunCompleted { run_id }
            | Self::RunFailed { run_id, .. }
            | Self::RunCancelled { run_id, .. } => run_id,
        }
    }

    /// Whether this event ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RunCompleted { .. } | Self::RunFailed { .. } | Self::RunCancelled { .. }
        )
    }
}

/// Fan-out of run events to any number of subscribers.
///
/// Publishing never blocks; slow subscribers lag and skip events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RunEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.tx.subscribe()
    }

    /// Send to every receiver. Events with no receivers are dropped.
    pub fn publish(&self, event: RunEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(RunEvent::RunCompleted {
            run_id: "r1".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.run_id(), "r1");
        assert!(event.is_terminal());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        bus.publish(RunEvent::StepCompleted {
            run_id: "r1".to_string(),
            step: 0,
        });
    }

    #[test]
    fn test_event_serialization() {
        let event = RunEvent::StepOutput {
            run_id: "r1".to_string(),
            step: 2,
            delta: "abc".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "step_output");
        assert_eq!(json["delta"], "abc");
    }
}
