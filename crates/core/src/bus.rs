// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Internal publish/subscribe bus.
//!
//! Topics are dotted strings (`task.completed`, `engine.stopped`). Delivery
//! is asynchronous through a single pump task, which makes delivery FIFO
//! across all topics; `publish_sync` delivers inline for tests and paths
//! that must observe their own events. Subscribers registered under
//! [`WILDCARD_TOPIC`] receive every event.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Topic that matches every published event.
pub const WILDCARD_TOPIC: &str = "*";

type Handler = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Opaque token returned by [`EventBus::subscribe`]; cancels on use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    topics: HashMap<String, Vec<(u64, Handler)>>,
    wildcard: Vec<(u64, Handler)>,
}

struct Inner {
    registry: Mutex<Registry>,
    tx: mpsc::UnboundedSender<(String, Value)>,
}

/// Handle for publishing and subscribing. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

/// Delivery task companion to an [`EventBus`].
///
/// Must be driven (`tokio::spawn(pump.run())`) for `publish` to deliver;
/// `publish_sync` works without it.
pub struct EventPump {
    rx: mpsc::UnboundedReceiver<(String, Value)>,
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new() -> (Self, EventPump) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner { registry: Mutex::new(Registry::default()), tx });
        (Self { inner: Arc::clone(&inner) }, EventPump { rx, inner })
    }

    /// Register a handler for `topic` ([`WILDCARD_TOPIC`] for all events).
    ///
    /// Handlers run in subscription order per topic. A handler needing async
    /// work should spawn it; the bus invokes handlers synchronously.
    pub fn subscribe(
        &self,
        topic: &str,
        handler: impl Fn(&str, &Value) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut registry = self.inner.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        let entry = (id, Arc::new(handler) as Handler);
        if topic == WILDCARD_TOPIC {
            registry.wildcard.push(entry);
        } else {
            registry.topics.entry(topic.to_string()).or_default().push(entry);
        }
        SubscriptionId(id)
    }

    /// Cancel a subscription. Unknown tokens are ignored.
    pub fn unsubscribe(&self, token: SubscriptionId) {
        let mut registry = self.inner.registry.lock();
        registry.wildcard.retain(|(id, _)| *id != token.0);
        for handlers in registry.topics.values_mut() {
            handlers.retain(|(id, _)| *id != token.0);
        }
    }

    /// Queue an event for asynchronous delivery by the pump.
    pub fn publish(&self, topic: &str, payload: Value) {
        if self.inner.tx.send((topic.to_string(), payload)).is_err() {
            debug!(topic, "event dropped: pump has shut down");
        }
    }

    /// Deliver an event inline on the caller.
    pub fn publish_sync(&self, topic: &str, payload: &Value) {
        deliver(&self.inner, topic, payload);
    }

    #[cfg(test)]
    fn subscriber_count(&self, topic: &str) -> usize {
        let registry = self.inner.registry.lock();
        if topic == WILDCARD_TOPIC {
            registry.wildcard.len()
        } else {
            registry.topics.get(topic).map_or(0, Vec::len)
        }
    }
}

impl EventPump {
    /// Drain the queue until every [`EventBus`] handle is dropped.
    pub async fn run(mut self) {
        while let Some((topic, payload)) = self.rx.recv().await {
            deliver(&self.inner, &topic, &payload);
        }
    }
}

fn deliver(inner: &Inner, topic: &str, payload: &Value) {
    // Snapshot handlers so delivery runs without the registry lock held.
    let handlers: Vec<Handler> = {
        let registry = inner.registry.lock();
        registry
            .topics
            .get(topic)
            .into_iter()
            .flatten()
            .chain(registry.wildcard.iter())
            .map(|(_, h)| Arc::clone(h))
            .collect()
    };
    for handler in handlers {
        // A failing subscriber must not take down its siblings.
        if catch_unwind(AssertUnwindSafe(|| handler(topic, payload))).is_err() {
            error!(topic, "event subscriber panicked");
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
