//! Topic bus implementation.
//!
//! Registrations are indexed by topic name, each topic holding its
//! registrations in subscription order. A query selects a contiguous range
//! of that index, so neither `publish` nor `unsubscribe` scans unrelated
//! topics.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::SubscriptionKey;
use crate::runtime::{Deferred, Promise, Scheduler};

use super::topic::{SubscribeOptions, TopicMatch};

// ============================================================================
// Types
// ============================================================================

/// Listener callback, invoked with the published topic and its data.
pub type Listener = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Registration table keyed by topic.
type Table = BTreeMap<String, Vec<Registration>>;

struct Registration {
    sequence: u64,
    options: SubscribeOptions,
    listener: Listener,
}

/// A listener picked by one publish.
struct Selected {
    sequence: u64,
    sync: bool,
    listener: Listener,
}

struct BusInner {
    table: Mutex<Table>,
    sequence: AtomicU64,
    scheduler: Scheduler,
    matching: TopicMatch,
}

// ============================================================================
// TopicBus
// ============================================================================

/// Topic-based publish/subscribe bus.
///
/// Cloning yields another handle to the same registrations.
///
/// # Example
///
/// ```ignore
/// let bus = TopicBus::new(&event_loop.scheduler());
/// bus.subscribe_sync("evt", |topic, data| println!("{topic}: {data}"), SubscribeOptions::new())?;
/// bus.publish("evt", json!({"n": 1}));
/// ```
#[derive(Clone)]
pub struct TopicBus {
    inner: Arc<BusInner>,
}

impl fmt::Debug for TopicBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicBus")
            .field("matching", &self.inner.matching)
            .field("registrations", &self.len())
            .finish()
    }
}

impl TopicBus {
    /// Creates a bus with [`TopicMatch::Namespace`] matching.
    #[must_use]
    pub fn new(scheduler: &Scheduler) -> Self {
        Self::with_matching(scheduler, TopicMatch::default())
    }

    /// Creates a bus with the given matching mode.
    #[must_use]
    pub fn with_matching(scheduler: &Scheduler, matching: TopicMatch) -> Self {
        Self {
            inner: Arc::new(BusInner {
                table: Mutex::new(Table::new()),
                sequence: AtomicU64::new(0),
                scheduler: scheduler.clone(),
                matching,
            }),
        }
    }

    /// Returns the scheduler deferred listeners run on.
    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Registers a listener on `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `topic` is empty.
    pub fn subscribe<F>(
        &self,
        topic: &str,
        listener: F,
        options: SubscribeOptions,
    ) -> Result<SubscriptionKey>
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        if topic.is_empty() {
            return Err(Error::invalid_argument("topic must be a non-empty string"));
        }

        let sequence = self.inner.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let key = SubscriptionKey::new(Arc::from(topic), sequence);

        self.inner
            .table
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(Registration {
                sequence,
                options,
                listener: Arc::new(listener),
            });

        trace!(%key, once = options.once, sync = options.sync, "Subscribed");
        Ok(key)
    }

    /// Registers a listener removed after its first delivery.
    pub fn subscribe_once<F>(
        &self,
        topic: &str,
        listener: F,
        options: SubscribeOptions,
    ) -> Result<SubscriptionKey>
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.subscribe(topic, listener, options.with_once())
    }

    /// Registers a listener delivered inside the `publish` call.
    pub fn subscribe_sync<F>(
        &self,
        topic: &str,
        listener: F,
        options: SubscribeOptions,
    ) -> Result<SubscriptionKey>
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.subscribe(topic, listener, options.with_sync())
    }

    /// Removes every registration selected by `topic`.
    ///
    /// Returns how many were removed.
    pub fn unsubscribe(&self, topic: &str) -> usize {
        let mut table = self.inner.table.lock();
        let removed: usize = self
            .matching_topics(&table, topic)
            .iter()
            .filter_map(|name| table.remove(name))
            .map(|registrations| registrations.len())
            .sum();

        debug!(topic, removed, "Unsubscribed");
        removed
    }

    /// Removes the registration with this exact key.
    ///
    /// Returns `true` if it was present.
    pub fn unsubscribe_key(&self, key: &SubscriptionKey) -> bool {
        let mut table = self.inner.table.lock();
        let Some(registrations) = table.get_mut(key.topic()) else {
            return false;
        };

        let before = registrations.len();
        registrations.retain(|r| r.sequence != key.sequence());
        let removed = registrations.len() != before;

        if registrations.is_empty() {
            table.remove(key.topic());
        }

        removed
    }

    /// Publishes `data` on `topic`.
    ///
    /// Sync listeners run before this returns; the rest run together on the
    /// next tick, each class in subscription order. `once` registrations are
    /// removed before any listener runs. The returned promise fulfills after
    /// the deferred batch has run.
    pub fn publish(&self, topic: &str, data: Value) -> Promise<()> {
        let selected = self.take_selected(topic);
        let (immediate, deferred): (Vec<_>, Vec<_>) =
            selected.into_iter().partition(|s| s.sync);

        trace!(
            topic,
            sync = immediate.len(),
            deferred = deferred.len(),
            "Publishing"
        );

        let (promise, resolver) = Deferred::new(&self.inner.scheduler).into_parts();

        for selected in immediate {
            (selected.listener)(topic, &data);
        }

        let topic = topic.to_string();
        self.inner.scheduler.defer(move || {
            for selected in deferred {
                (selected.listener)(&topic, &data);
            }
            resolver.resolve(());
        });

        promise
    }

    /// Returns the total number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.table.lock().values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.table.lock().is_empty()
    }

    /// Returns the topics that currently have registrations, sorted.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        self.inner.table.lock().keys().cloned().collect()
    }

    /// Snapshots the listeners selected by `topic` and drops `once`
    /// registrations from the table.
    fn take_selected(&self, topic: &str) -> Vec<Selected> {
        let mut table = self.inner.table.lock();
        let mut selected = Vec::new();

        for name in self.matching_topics(&table, topic) {
            let Some(registrations) = table.get_mut(&name) else {
                continue;
            };

            selected.extend(registrations.iter().map(|r| Selected {
                sequence: r.sequence,
                sync: r.options.sync,
                listener: Arc::clone(&r.listener),
            }));
            registrations.retain(|r| !r.options.once);

            if registrations.is_empty() {
                table.remove(&name);
            }
        }

        selected.sort_by_key(|s| s.sequence);
        selected
    }

    /// Topics selected by `query`, found by a range scan over the index.
    fn matching_topics(&self, table: &Table, query: &str) -> Vec<String> {
        table
            .range::<str, _>((Bound::Included(query), Bound::Unbounded))
            .take_while(|(name, _)| name.starts_with(query))
            .filter(|(name, _)| self.inner.matching.matches(name, query))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
