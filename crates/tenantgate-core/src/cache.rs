//! Bounded per-session message cache.
//!
//! Keeps the most recent `capacity` messages in insertion order, keyed by
//! message id, plus a pointer to the leading message (the one most recently
//! inserted or updated). When a new id would exceed capacity the oldest
//! insertion is dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tenantgate_types::error::CacheError;
use tenantgate_types::message::{Message, MessageStatus};
use tracing::debug;

/// Result of inserting a message into the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// A new id was stored. Carries the id that was evicted to make room, if any.
    Inserted { evicted: Option<String> },
    /// An existing id was replaced in place.
    Replaced,
}

struct CacheInner {
    entries: HashMap<String, Message>,
    /// Ids in insertion order, oldest first.
    order: VecDeque<String>,
    leading: Option<String>,
}

/// Thread-safe bounded message store owned by one session.
///
/// All mutations for a given id happen under a single lock, so concurrent
/// ingestion and status updates never interleave on the same message.
pub struct MessageCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl MessageCache {
    /// Create a cache holding at most `capacity` messages (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(capacity.min(1024)),
                order: VecDeque::with_capacity(capacity.min(1024)),
                leading: None,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `message`, or replace the cached copy with the same id.
    ///
    /// A replacement never moves the status backwards: if the incoming copy
    /// carries an older status the cached status is kept. Either way the
    /// message becomes the leading one.
    pub fn upsert(&self, mut message: Message) -> UpsertOutcome {
        let mut inner = self.lock();
        let id = message.id.clone();

        if let Some(existing) = inner.entries.get(&id) {
            if existing.status != message.status
                && !existing.status.can_transition_to(message.status)
            {
                message.status = existing.status;
            }
            inner.entries.insert(id.clone(), message);
            inner.leading = Some(id);
            return UpsertOutcome::Replaced;
        }

        inner.entries.insert(id.clone(), message);
        inner.order.push_back(id.clone());
        inner.leading = Some(id);

        let mut evicted = None;
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                debug!(message_id = %oldest, capacity = self.capacity, "evicted oldest cached message");
                evicted = Some(oldest);
            }
        }
        UpsertOutcome::Inserted { evicted }
    }

    /// Move message `id` to `status` if it is cached and the move is forward.
    ///
    /// Returns the updated message, or `None` when the id is unknown or the
    /// transition would violate the monotonic order. On success the message
    /// becomes the leading one.
    pub fn update_status(&self, id: &str, status: MessageStatus) -> Option<Message> {
        let mut inner = self.lock();
        let message = inner.entries.get_mut(id)?;
        if !message.status.can_transition_to(status) {
            return None;
        }
        message.status = status;
        let updated = message.clone();
        inner.leading = Some(id.to_string());
        Some(updated)
    }

    /// The most recently inserted or updated message, if any.
    pub fn leading(&self) -> Option<Message> {
        let inner = self.lock();
        inner
            .leading
            .as_ref()
            .and_then(|id| inner.entries.get(id))
            .cloned()
    }

    pub fn get(&self, id: &str) -> Result<Message, CacheError> {
        self.lock()
            .entries
            .get(id)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(id.to_string()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().expect("message cache lock poisoned")
    }
}

impl std::fmt::Debug for MessageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
