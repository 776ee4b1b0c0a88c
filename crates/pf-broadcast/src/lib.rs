//! Broadcaster (spec §4.F): a thread-safe per-session push channel
//! delivering outbound events to the client.
//!
//! Holds a map `session_id → channel`. Writes serialize through a
//! per-session mutex. `publish` is non-blocking best-effort delivery to
//! the one registered channel; a closed or missing channel drops
//! silently. This is the only way the Tool Server reaches the client —
//! it never writes to the client directly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pf_domain::event::OutboundEvent;
use tokio::sync::mpsc;

/// Channel capacity for a session's outbound queue. A slow or stuck
/// client backs up here rather than blocking the publisher.
const CHANNEL_CAPACITY: usize = 256;

struct Connection {
    sender: mpsc::Sender<OutboundEvent>,
    last_active: DateTime<Utc>,
}

/// Thread-safe registry of per-session outbound channels.
pub struct Broadcaster {
    sessions: Mutex<HashMap<String, Connection>>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new connection for `session_id`, returning the
    /// receiving half. Replaces any existing channel for the same
    /// session (reconnect scenario) — the old receiver is dropped and
    /// any further sends on it simply fail silently from then on.
    pub fn register(&self, session_id: &str) -> mpsc::Receiver<OutboundEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.sessions.lock().insert(
            session_id.to_owned(),
            Connection {
                sender: tx,
                last_active: Utc::now(),
            },
        );
        tracing::info!(session_id, "broadcaster: session registered");
        rx
    }

    /// Drop the channel for `session_id` (on disconnect).
    pub fn remove(&self, session_id: &str) {
        if self.sessions.lock().remove(session_id).is_some() {
            tracing::info!(session_id, "broadcaster: session removed");
        }
    }

    /// Non-blocking best-effort delivery. A missing or closed channel,
    /// or a full queue, drops the event silently — this is not an
    /// error path (spec §4.F).
    pub fn publish(&self, session_id: &str, event: OutboundEvent) {
        let mut sessions = self.sessions.lock();
        let Some(conn) = sessions.get_mut(session_id) else {
            tracing::debug!(session_id, event = %event.event_type, "broadcaster: no channel, dropped");
            return;
        };
        conn.last_active = Utc::now();
        if conn.sender.try_send(event).is_err() {
            tracing::debug!(session_id, "broadcaster: channel closed or full, dropped");
        }
    }

    /// Update the liveness timestamp without publishing (called on any
    /// inbound frame from the client, independent of outbound traffic).
    pub fn touch(&self, session_id: &str) {
        if let Some(conn) = self.sessions.lock().get_mut(session_id) {
            conn.last_active = Utc::now();
        }
    }

    /// Number of currently registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Drop channels that haven't published or been touched for longer
    /// than `timeout_secs`.
    pub fn prune_stale(&self, timeout_secs: i64) {
        let now = Utc::now();
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, conn| now.signed_duration_since(conn.last_active).num_seconds() < timeout_secs);
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::info!(pruned, remaining = sessions.len(), "broadcaster: pruned stale sessions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_to_registered_channel() {
        let bc = Broadcaster::new();
        let mut rx = bc.register("s1");
        bc.publish("s1", OutboundEvent::new("session_paused"));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "session_paused");
    }

    #[test]
    fn publish_to_missing_session_does_not_panic() {
        let bc = Broadcaster::new();
        bc.publish("ghost", OutboundEvent::new("timer_update"));
    }

    #[tokio::test]
    async fn publish_to_dropped_receiver_does_not_panic() {
        let bc = Broadcaster::new();
        let rx = bc.register("s1");
        drop(rx);
        bc.publish("s1", OutboundEvent::new("timer_update"));
    }

    #[test]
    fn remove_drops_registration() {
        let bc = Broadcaster::new();
        let _rx = bc.register("s1");
        assert_eq!(bc.len(), 1);
        bc.remove("s1");
        assert!(bc.is_empty());
    }

    #[test]
    fn register_replaces_existing() {
        let bc = Broadcaster::new();
        let _rx1 = bc.register("s1");
        let _rx2 = bc.register("s1");
        assert_eq!(bc.len(), 1);
    }

    #[test]
    fn prune_stale_removes_old_entries_only() {
        let bc = Broadcaster::new();
        let _rx = bc.register("fresh");
        {
            let mut sessions = bc.sessions.lock();
            let conn = sessions.get_mut("fresh").unwrap();
            conn.last_active = Utc::now() - chrono::Duration::seconds(1000);
        }
        bc.prune_stale(120);
        assert!(bc.is_empty());
    }
}
