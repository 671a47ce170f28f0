//! Outbound queue with a single in-flight slot.
//!
//! `peek_next` hands out the front item and marks it in flight without
//! removing it. The carrier then either `commit`s it (delivery confirmed)
//! or `cancel`s it (it stays at the front for the next attempt). While an
//! item is in flight `peek_next` returns `None`.

use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A queued, encoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxItem {
    /// Monotonic sequence number, kept across redelivery.
    pub seq: u64,
    pub data: Bytes,
}

#[derive(Debug, Default)]
struct OutboxInner {
    queue: VecDeque<OutboxItem>,
    in_flight: bool,
    next_seq: u64,
}

/// Thread-safe outbox shared by the client and its carriers.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    inner: Arc<Mutex<OutboxInner>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, OutboxInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `data` and returns its sequence number. Never blocks on I/O.
    pub fn enqueue(&self, data: impl Into<Bytes>) -> u64 {
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.queue.push_back(OutboxItem {
            seq,
            data: data.into(),
        });
        seq
    }

    /// Marks the front item in flight and returns it.
    pub fn peek_next(&self) -> Option<OutboxItem> {
        let mut inner = self.lock();
        if inner.in_flight {
            return None;
        }
        let item = inner.queue.front().cloned()?;
        inner.in_flight = true;
        Some(item)
    }

    /// Removes the in-flight item after confirmed delivery.
    pub fn commit(&self) -> Option<OutboxItem> {
        let mut inner = self.lock();
        if !inner.in_flight {
            return None;
        }
        inner.in_flight = false;
        let item = inner.queue.pop_front();
        if let Some(item) = &item {
            debug!(seq = item.seq, "outbox item committed");
        }
        item
    }

    /// Returns the in-flight item to the queue for another attempt.
    pub fn cancel(&self) -> bool {
        let mut inner = self.lock();
        let was = inner.in_flight;
        inner.in_flight = false;
        was
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub fn has_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    /// Drops every queued item, including one in flight. Returns how many.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        inner.in_flight = false;
        let n = inner.queue.len();
        inner.queue.clear();
        n
    }
}
