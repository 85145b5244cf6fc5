// src/realtime/mod.rs

pub mod socket;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;

/// Channel families events fan out over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// All activity within one exam, watched by its teacher and its
    /// live participants.
    Exam(i64),
    /// Personal notifications for one student.
    Student(i64),
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Exam(id) => write!(f, "exam:{id}"),
            Channel::Student(id) => write!(f, "student:{id}"),
        }
    }
}

/// Wire-level message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Connected,
    ExamProgress,
    LeaderboardUpdate,
    Notification,
    Pong,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connected => "connected",
            EventKind::ExamProgress => "exam_progress",
            EventKind::LeaderboardUpdate => "leaderboard_update",
            EventKind::Notification => "notification",
            EventKind::Pong => "pong",
        }
    }
}

/// Serializes one event into its wire envelope.
pub fn envelope(kind: EventKind, data: serde_json::Value) -> String {
    json!({ "type": kind.as_str(), "data": data }).to_string()
}

struct RegistryInner {
    /// Per-channel members, keyed by connection id.
    channels: HashMap<Channel, HashMap<u64, mpsc::UnboundedSender<String>>>,
    /// Which channels each connection joined, for O(1) teardown.
    memberships: HashMap<u64, Vec<Channel>>,
}

/// Connection registry for the realtime fan-out.
///
/// Owned by the process state and handed to whoever needs to publish;
/// there is no global instance. Senders are unbounded, so publishing
/// never waits on a slow subscriber; a stalled connection's backlog is
/// bounded by its own queue and dropped wholesale on disconnect.
///
/// Delivery is best-effort and at-most-once. Nothing is replayed to a
/// connection that subscribes late or drops mid-stream.
pub struct Registry {
    next_connection_id: AtomicU64,
    inner: Mutex<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            next_connection_id: AtomicU64::new(1),
            inner: Mutex::new(RegistryInner {
                channels: HashMap::new(),
                memberships: HashMap::new(),
            }),
        }
    }

    /// Registers one connection on a set of channels and returns its id.
    pub fn subscribe(
        &self,
        channels: Vec<Channel>,
        sender: mpsc::UnboundedSender<String>,
    ) -> u64 {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().unwrap();
        for channel in &channels {
            inner
                .channels
                .entry(*channel)
                .or_default()
                .insert(connection_id, sender.clone());
        }
        inner.memberships.insert(connection_id, channels);
        connection_id
    }

    /// Removes a connection from every channel it joined.
    pub fn unsubscribe(&self, connection_id: u64) {
        let mut inner = self.inner.lock().unwrap();
        let Some(channels) = inner.memberships.remove(&connection_id) else {
            return;
        };
        for channel in channels {
            if let Some(members) = inner.channels.get_mut(&channel) {
                members.remove(&connection_id);
                if members.is_empty() {
                    inner.channels.remove(&channel);
                }
            }
        }
    }

    /// Fans one event out to the channel's current members and returns
    /// how many were reached. Members whose receiving side is gone are
    /// pruned on the way.
    pub fn publish(&self, channel: Channel, kind: EventKind, data: serde_json::Value) -> usize {
        let message = envelope(kind, data);
        let mut inner = self.inner.lock().unwrap();
        let Some(members) = inner.channels.get_mut(&channel) else {
            return 0;
        };

        let mut dead: Vec<u64> = Vec::new();
        let mut delivered = 0;
        for (connection_id, sender) in members.iter() {
            if sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*connection_id);
            }
        }
        for connection_id in &dead {
            members.remove(connection_id);
        }
        if members.is_empty() {
            inner.channels.remove(&channel);
        }
        drop(inner);

        for connection_id in dead {
            self.unsubscribe(connection_id);
        }
        delivered
    }

    /// Live connection count, for the health endpoint.
    pub fn connection_count(&self) -> usize {
        self.inner.lock().unwrap().memberships.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
