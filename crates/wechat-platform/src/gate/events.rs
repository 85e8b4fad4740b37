//! Notifications emitted by session strategies to the owner of a gate.

use std::fmt;

use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

/// Session lifecycle notifications.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new session value was obtained by an acquisition.
    Acquired { session: String },
    /// The platform reported that the identity is not an operator of the target.
    Disconnected { code: i64 },
}

impl fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Session values are credentials; keep them out of logs.
            SessionEvent::Acquired { session } => f
                .debug_struct("Acquired")
                .field("session_len", &session.len())
                .finish(),
            SessionEvent::Disconnected { code } => {
                f.debug_struct("Disconnected").field("code", code).finish()
            }
        }
    }
}

/// Broadcast sink shared between a strategy and its owner.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Having no subscriber is not an error.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_reaches_subscribers() {
        let sink = EventSink::new();
        let mut rx = sink.subscribe();
        sink.emit(SessionEvent::Disconnected { code: 300333 });
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::Disconnected { code: 300333 }
        );
    }

    #[test]
    fn test_emit_without_subscribers_and_redacted_debug() {
        let sink = EventSink::new();
        sink.emit(SessionEvent::Acquired {
            session: "secret".to_string(),
        });
        let rendered = format!(
            "{:?}",
            SessionEvent::Acquired {
                session: "secret".to_string()
            }
        );
        assert!(!rendered.contains("secret"));
    }
}
