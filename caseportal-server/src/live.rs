//! Live update hub
//!
//! Fan-out of "something changed, re-fetch" notifications. Each case gets one
//! broadcast channel carrying every change to the case row and its comments,
//! attachments and messages; case-row changes are also sent on a global
//! channel for admin dashboards.
//!
//! A [`Subscription`] is the only way to listen. Dropping it unsubscribes, and
//! the hub frees a channel once its last subscription is gone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

/// Default per-channel buffer before slow subscribers start lagging
pub const DEFAULT_CAPACITY: usize = 64;

/// Table whose rows changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Cases,
    CaseComments,
    CaseAttachments,
    CaseMessages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row-level change. Carries no row content: consumers re-fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Change {
    pub table: Table,
    pub kind: ChangeKind,
    pub case_id: Uuid,
}

impl Change {
    pub fn new(table: Table, kind: ChangeKind, case_id: Uuid) -> Self {
        Self {
            table,
            kind,
            case_id,
        }
    }
}

/// What a subscriber wants to hear about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "topic", content = "case_id", rename_all = "snake_case")]
pub enum Topic {
    /// Updates to one case row
    Case(Uuid),
    Comments(Uuid),
    Attachments(Uuid),
    Messages(Uuid),
    /// Every change touching one case
    Activity(Uuid),
    /// Case-row changes across all cases
    AllCases,
}

impl Topic {
    fn channel(&self) -> ChannelKey {
        match *self {
            Self::Case(id)
            | Self::Comments(id)
            | Self::Attachments(id)
            | Self::Messages(id)
            | Self::Activity(id) => ChannelKey::Case(id),
            Self::AllCases => ChannelKey::AllCases,
        }
    }

    pub fn matches(&self, change: &Change) -> bool {
        match *self {
            Self::Case(id) => change.case_id == id && change.table == Table::Cases,
            Self::Comments(id) => change.case_id == id && change.table == Table::CaseComments,
            Self::Attachments(id) => {
                change.case_id == id && change.table == Table::CaseAttachments
            }
            Self::Messages(id) => change.case_id == id && change.table == Table::CaseMessages,
            Self::Activity(id) => change.case_id == id,
            Self::AllCases => change.table == Table::Cases,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ChannelKey {
    Case(Uuid),
    AllCases,
}

/// Delivered to a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notice {
    /// A matching change happened
    Changed(Change),
    /// The subscriber fell behind and missed `skipped` notifications; re-fetch
    Resync { skipped: u64 },
}

struct HubInner {
    capacity: usize,
    channels: Mutex<HashMap<ChannelKey, broadcast::Sender<Change>>>,
}

impl HubInner {
    fn channels(&self) -> MutexGuard<'_, HashMap<ChannelKey, broadcast::Sender<Change>>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared live update hub. Cheap to clone.
#[derive(Clone)]
pub struct LiveHub {
    inner: Arc<HubInner>,
}

impl LiveHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                capacity: capacity.max(1),
                channels: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start listening on `topic`.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let key = topic.channel();
        let rx = {
            let mut channels = self.inner.channels();
            channels
                .entry(key)
                .or_insert_with(|| broadcast::channel(self.inner.capacity).0)
                .subscribe()
        };

        tracing::debug!(?topic, "live subscription opened");
        Subscription {
            topic,
            key,
            rx,
            hub: Arc::clone(&self.inner),
        }
    }

    /// Notify every subscriber whose topic matches. Returns the number of
    /// channel receivers reached.
    pub fn publish(&self, change: Change) -> usize {
        let channels = self.inner.channels();
        let mut reached = 0;

        if let Some(tx) = channels.get(&ChannelKey::Case(change.case_id)) {
            reached += tx.send(change).unwrap_or(0);
        }
        if change.table == Table::Cases {
            if let Some(tx) = channels.get(&ChannelKey::AllCases) {
                reached += tx.send(change).unwrap_or(0);
            }
        }

        tracing::trace!(?change, reached, "live change published");
        reached
    }

    /// Live subscriptions sharing the channel behind `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner
            .channels()
            .get(&topic.channel())
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Number of channels currently allocated.
    pub fn channel_count(&self) -> usize {
        self.inner.channels().len()
    }
}

impl Default for LiveHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Scoped listener handle. Unsubscribes on drop.
pub struct Subscription {
    topic: Topic,
    key: ChannelKey,
    rx: broadcast::Receiver<Change>,
    hub: Arc<HubInner>,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Wait for the next notification matching this subscription's topic.
    ///
    /// Returns `None` only if the hub itself is gone.
    pub async fn recv(&mut self) -> Option<Notice> {
        loop {
            match self.rx.recv().await {
                Ok(change) if self.topic.matches(&change) => return Some(Notice::Changed(change)),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = ?self.topic, skipped, "live subscriber lagged");
                    return Some(Notice::Resync { skipped });
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Explicitly end the subscription. Equivalent to dropping it.
    pub fn close(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut channels = self.hub.channels();
        // Our own receiver is still alive here, so 1 means we were the last.
        let last = channels
            .get(&self.key)
            .map(|tx| tx.receiver_count() <= 1)
            .unwrap_or(false);
        if last {
            channels.remove(&self.key);
        }
        tracing::debug!(topic = ?self.topic, freed = last, "live subscription closed");
    }
}
