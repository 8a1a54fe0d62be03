//! The session capability the core delivers events through.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use uuid::Uuid;

use swi_shared::ServerEvent;

/// Outbound queue depth per connection
pub const SESSION_QUEUE_SIZE: usize = 256;

/// A connected observer. Delivery never blocks.
pub trait Session: Send + Sync {
    fn id(&self) -> Uuid;

    /// Queues an event. Returns false when the event was dropped.
    fn deliver(&self, event: ServerEvent) -> bool;

    fn is_connected(&self) -> bool;
}

/// A session backed by a bounded channel drained by the connection's writer task
pub struct ChannelSession {
    id: Uuid,
    sender: mpsc::Sender<ServerEvent>,
    connected: AtomicBool,
}

impl ChannelSession {
    pub fn new() -> (Self, mpsc::Receiver<ServerEvent>) {
        let (sender, receiver) = mpsc::channel(SESSION_QUEUE_SIZE);
        let session = Self {
            id: Uuid::new_v4(),
            sender,
            connected: AtomicBool::new(true),
        };
        (session, receiver)
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Session for ChannelSession {
    fn id(&self) -> Uuid {
        self.id
    }

    fn deliver(&self, event: ServerEvent) -> bool {
        self.is_connected() && self.sender.try_send(event).is_ok()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.sender.is_closed()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records everything delivered to it
    pub struct RecordingSession {
        id: Uuid,
        pub events: Mutex<Vec<ServerEvent>>,
        pub connected: AtomicBool,
    }

    impl RecordingSession {
        pub fn new() -> Self {
            Self {
                id: Uuid::new_v4(),
                events: Mutex::new(Vec::new()),
                connected: AtomicBool::new(true),
            }
        }

        /// All generic messages received so far, flattened
        pub fn messages(&self) -> Vec<String> {
            self.events
                .lock()
                .iter()
                .filter_map(|e| match e {
                    ServerEvent::Generic { messages, .. } => Some(messages.clone()),
                    _ => None,
                })
                .flatten()
                .collect()
        }

        pub fn saw(&self, needle: &str) -> bool {
            self.messages().iter().any(|m| m.contains(needle))
        }
    }

    impl Session for RecordingSession {
        fn id(&self) -> Uuid {
            self.id
        }

        fn deliver(&self, event: ServerEvent) -> bool {
            if !self.is_connected() {
                return false;
            }
            self.events.lock().push(event);
            true
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (session, _rx) = ChannelSession::new();
        for _ in 0..SESSION_QUEUE_SIZE {
            assert!(session.deliver(ServerEvent::normal("tick")));
        }
        assert!(!session.deliver(ServerEvent::normal("one too many")));
    }

    #[test]
    fn disconnected_session_rejects_delivery() {
        let (session, _rx) = ChannelSession::new();
        session.disconnect();
        assert!(!session.is_connected());
        assert!(!session.deliver(ServerEvent::normal("hello")));
    }

    #[test]
    fn dropped_receiver_reads_as_disconnected() {
        let (session, rx) = ChannelSession::new();
        drop(rx);
        assert!(!session.is_connected());
    }
}
