//! Lifecycle event notification
//!
//! Best-effort, synchronous-with-the-state-change notifications for
//! observers. Emission never blocks and never fails the triggering
//! operation: with no subscribers the send error is dropped, and a slow
//! subscriber lags on its own receiver without affecting dispatch.

use crate::dispatch::request::Priority;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// A dispatcher lifecycle notification
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEvent {
    AgentRegistered {
        agent_id: String,
    },
    AgentUnregistered {
        agent_id: String,
    },
    RequestReceived {
        request_id: String,
        agent_id: String,
    },
    RequestQueued {
        request_id: String,
        agent_id: String,
        priority: Priority,
    },
    RequestStarted {
        request_id: String,
        agent_id: String,
    },
    RequestCompleted {
        request_id: String,
        agent_id: String,
        duration_ms: u64,
    },
    RequestFailed {
        request_id: String,
        agent_id: String,
        reason: String,
    },
}

/// Broadcast-based notifier handed out by the dispatcher
#[derive(Debug, Clone)]
pub struct EventNotifier {
    sender: broadcast::Sender<DispatchEvent>,
}

impl EventNotifier {
    /// Create a notifier with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event; purely advisory, errors are dropped
    pub fn emit(&self, event: DispatchEvent) {
        trace!(?event, "dispatch event");
        let _ = self.sender.send(event);
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let notifier = EventNotifier::new(16);
        let mut rx = notifier.subscribe();

        notifier.emit(DispatchEvent::AgentRegistered {
            agent_id: "a1".to_string(),
        });

        match rx.recv().await.unwrap() {
            DispatchEvent::AgentRegistered { agent_id } => assert_eq!(agent_id, "a1"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_harmless() {
        let notifier = EventNotifier::new(16);
        notifier.emit(DispatchEvent::RequestFailed {
            request_id: "r1".to_string(),
            agent_id: "a1".to_string(),
            reason: "timeout".to_string(),
        });
    }

    #[tokio::test]
    async fn test_event_serialization_tag() {
        let event = DispatchEvent::RequestQueued {
            request_id: "r1".to_string(),
            agent_id: "a1".to_string(),
            priority: Priority::High,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "request_queued");
        assert_eq!(json["priority"], "high");
    }
}
