//! In-process stream with consumer-group semantics

use super::{OrderStream, ReadCursor, ResponsePublisher, StreamError, StreamMessage};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::time::Instant;

/// A response emitted on a named channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedResponse {
    pub channel: String,
    pub payload: String,
}

#[derive(Debug)]
struct Entry {
    id: String,
    fields: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct GroupState {
    /// Position of the next entry never delivered to the group
    next_undelivered: usize,
    /// Delivered-but-unacknowledged positions per consumer, with the time of
    /// their last delivery
    pending: HashMap<String, BTreeMap<usize, Instant>>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: VecDeque<Entry>,
    /// Position of `entries[0]`; positions are never reused after trimming
    first: usize,
    index: HashMap<String, usize>,
    group: Option<GroupState>,
}

impl Inner {
    fn entry(&self, position: usize) -> Option<&Entry> {
        position
            .checked_sub(self.first)
            .and_then(|offset| self.entries.get(offset))
    }

    fn end(&self) -> usize {
        self.first + self.entries.len()
    }

    /// Drop the oldest entries until at most `max_len` remain
    fn trim(&mut self, max_len: usize) {
        while self.entries.len() > max_len {
            let Some(entry) = self.entries.pop_front() else {
                break;
            };
            self.index.remove(&entry.id);
            let position = self.first;
            self.first += 1;

            if let Some(group) = self.group.as_mut() {
                for pending in group.pending.values_mut() {
                    pending.remove(&position);
                }
            }
        }
        if let Some(group) = self.group.as_mut() {
            group.next_undelivered = group.next_undelivered.max(self.first);
        }
    }
}

/// Single-process stand-in for a Redis stream and its pub/sub channels
///
/// Entries are shared by every consumer of the one group: each entry is
/// delivered to exactly one consumer and stays pending for it until acked
/// or claimed by another consumer.
pub struct MemoryStream {
    payload_field: String,
    max_len: Option<usize>,
    inner: Mutex<Inner>,
    arrivals: Notify,
    available: AtomicBool,
    responses: broadcast::Sender<PublishedResponse>,
}

impl MemoryStream {
    pub fn new(payload_field: impl Into<String>) -> Self {
        let (responses, _) = broadcast::channel(1024);
        Self {
            payload_field: payload_field.into(),
            max_len: None,
            inner: Mutex::new(Inner::default()),
            arrivals: Notify::new(),
            available: AtomicBool::new(true),
            responses,
        }
    }

    /// Keep at most `max_len` entries, dropping the oldest on append
    pub fn with_max_len(mut self, max_len: Option<usize>) -> Self {
        self.max_len = max_len;
        self
    }

    /// Append an entry with arbitrary fields, bypassing order encoding
    pub async fn inject_raw(&self, fields: &[(&str, &str)]) -> Result<String, StreamError> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        let position = inner.end();
        let id = format!("{}-{}", Utc::now().timestamp_millis(), position);
        inner.entries.push_back(Entry {
            id: id.clone(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        inner.index.insert(id.clone(), position);
        if let Some(max_len) = self.max_len {
            inner.trim(max_len);
        }
        drop(inner);

        self.arrivals.notify_waiters();
        Ok(id)
    }

    /// Simulate the stream endpoint going away or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        self.arrivals.notify_waiters();
    }

    /// Forget the consumer group, as when the stream key is deleted or the
    /// server restarts without persistence
    pub async fn drop_group(&self) {
        self.inner.lock().await.group = None;
        self.arrivals.notify_waiters();
    }

    /// Subscribe to every response published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedResponse> {
        self.responses.subscribe()
    }

    /// Entries currently held
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Entries delivered to some consumer but not yet acknowledged
    pub async fn pending_count(&self) -> usize {
        self.inner
            .lock()
            .await
            .group
            .as_ref()
            .map(|g| g.pending.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<(), StreamError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StreamError::Unavailable("memory stream offline".to_string()))
        }
    }

    fn to_message(&self, entry: &Entry) -> StreamMessage {
        StreamMessage {
            id: entry.id.clone(),
            payload: entry.fields.get(&self.payload_field).cloned(),
        }
    }

    async fn try_read(
        &self,
        consumer: &str,
        cursor: ReadCursor,
        count: usize,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        self.check_available()?;
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let group = inner.group.as_mut().ok_or_else(missing_group)?;
        let now = Instant::now();

        let positions: Vec<usize> = match cursor {
            ReadCursor::Pending => match group.pending.get_mut(consumer) {
                Some(pending) => pending
                    .iter_mut()
                    .take(count)
                    .map(|(&position, delivered_at)| {
                        *delivered_at = now;
                        position
                    })
                    .collect(),
                None => Vec::new(),
            },
            ReadCursor::New => {
                let start = group.next_undelivered.max(inner.first);
                let end = (start + count).min(inner.first + inner.entries.len());
                group.next_undelivered = end.max(start);

                let pending = group.pending.entry(consumer.to_string()).or_default();
                (start..end)
                    .inspect(|&position| {
                        pending.insert(position, now);
                    })
                    .collect()
            }
        };

        Ok(positions
            .into_iter()
            .filter_map(|position| inner.entry(position))
            .map(|entry| self.to_message(entry))
            .collect())
    }
}

fn missing_group() -> StreamError {
    StreamError::MissingGroup("NOGROUP consumer group does not exist".to_string())
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new("order")
    }
}

#[async_trait]
impl OrderStream for MemoryStream {
    async fn ensure_group(&self) -> Result<(), StreamError> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        if inner.group.is_none() {
            // Like a group created at `0`: everything still held is new to it
            let first = inner.first;
            inner.group = Some(GroupState {
                next_undelivered: first,
                pending: HashMap::new(),
            });
        }
        Ok(())
    }

    async fn read_batch(
        &self,
        consumer: &str,
        cursor: ReadCursor,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        let deadline = Instant::now() + block;

        loop {
            // Register for wakeups before looking, so an append between the
            // check and the wait is not missed.
            let arrival = self.arrivals.notified();
            tokio::pin!(arrival);
            arrival.as_mut().enable();

            let batch = self.try_read(consumer, cursor, count).await?;
            if !batch.is_empty() || cursor == ReadCursor::Pending {
                return Ok(batch);
            }

            if tokio::time::timeout_at(deadline, arrival).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn claim_stale(
        &self,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        self.check_available()?;
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let group = inner.group.as_mut().ok_or_else(missing_group)?;
        let now = Instant::now();

        let mut stale: Vec<(usize, String)> = group
            .pending
            .iter()
            .flat_map(|(owner, pending)| {
                pending
                    .iter()
                    .filter(move |(_, delivered_at)| now.duration_since(**delivered_at) >= min_idle)
                    .map(move |(&position, _)| (position, owner.clone()))
            })
            .collect();
        stale.sort_unstable();
        stale.truncate(count);

        for (position, owner) in &stale {
            if let Some(pending) = group.pending.get_mut(owner) {
                pending.remove(position);
            }
            group
                .pending
                .entry(consumer.to_string())
                .or_default()
                .insert(*position, now);
        }

        Ok(stale
            .into_iter()
            .filter_map(|(position, _)| inner.entry(position))
            .map(|entry| self.to_message(entry))
            .collect())
    }

    async fn ack(&self, id: &str) -> Result<(), StreamError> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        let Some(&position) = inner.index.get(id) else {
            return Ok(());
        };
        if let Some(group) = inner.group.as_mut() {
            for pending in group.pending.values_mut() {
                pending.remove(&position);
            }
        }
        Ok(())
    }

    async fn enqueue(&self, payload: &str) -> Result<String, StreamError> {
        let field = self.payload_field.clone();
        self.inject_raw(&[(field.as_str(), payload)]).await
    }

    async fn ping(&self) -> Result<(), StreamError> {
        self.check_available()
    }
}

#[async_trait]
impl ResponsePublisher for MemoryStream {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StreamError> {
        self.check_available()?;
        // No subscribers is not a failure: pub/sub is fire-and-forget.
        let _ = self.responses.send(PublishedResponse {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}
