//! In-memory broker implementation for testing and development.
//!
//! Models exactly the slice of broker behavior the session traits expose:
//! named FIFO queues with ready/in-flight message states, consumer counts,
//! passive/active declaration, mandatory publish, fetch-without-ack, and
//! negative-ack with requeue. Thread-safe for concurrent engine calls.
//!
//! Test hooks allow seeding queues, faking attached consumers, forcing
//! publish failures, and observing call counts (including that no connection
//! was ever opened).

use crate::error::BrokerError;
use crate::message::{Delivery, MessageProperties, PassiveDeclare, QueueInfo, QueueName};
use crate::session::{BrokerChannel, BrokerConnection, BrokerConnector, BrokerEndpoint};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Thread-safe storage for all queues on the fake broker
struct BrokerState {
    queues: HashMap<String, MemoryQueue>,
    /// Tag → owning queue name for outstanding unacknowledged fetches
    in_flight: HashMap<u64, (String, StoredMessage)>,
    next_delivery_tag: u64,
    last_prefetch: Option<u16>,
    fail_publishes: bool,
    swallow_publishes: bool,
}

impl BrokerState {
    fn new() -> Self {
        Self {
            queues: HashMap::new(),
            in_flight: HashMap::new(),
            next_delivery_tag: 1,
            last_prefetch: None,
            fail_publishes: false,
            swallow_publishes: false,
        }
    }
}

/// State of a single named queue
struct MemoryQueue {
    ready: VecDeque<StoredMessage>,
    consumer_count: u32,
    durable: bool,
    /// Properties of every publish accepted on this queue, in order
    published: Vec<MessageProperties>,
}

impl MemoryQueue {
    fn new(durable: bool) -> Self {
        Self {
            ready: VecDeque::new(),
            consumer_count: 0,
            durable,
            published: Vec::new(),
        }
    }

    fn info(&self) -> QueueInfo {
        QueueInfo {
            ready_count: self.ready.len() as u32,
            consumer_count: self.consumer_count,
        }
    }
}

#[derive(Clone)]
struct StoredMessage {
    body: Bytes,
}

/// Invocation counters observable from tests
#[derive(Default)]
struct BrokerCounters {
    connects: AtomicUsize,
    publishes: AtomicUsize,
    fetches: AtomicUsize,
    nacks: AtomicUsize,
}

// ============================================================================
// MemoryBroker
// ============================================================================

/// In-memory broker acting as its own connector
pub struct MemoryBroker {
    state: Arc<RwLock<BrokerState>>,
    counters: Arc<BrokerCounters>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(BrokerState::new())),
            counters: Arc::new(BrokerCounters::default()),
        }
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, BrokerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, BrokerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------------
    // Test setup hooks
    // ------------------------------------------------------------------------

    /// Provision a queue with an attached-consumer count
    pub fn provision_queue(&self, name: &str, consumer_count: u32) {
        let mut state = self.write_state();
        let queue = state
            .queues
            .entry(name.to_string())
            .or_insert_with(|| MemoryQueue::new(true));
        queue.consumer_count = consumer_count;
    }

    /// Place a ready message on a queue without going through publish
    pub fn seed_message(&self, name: &str, body: &str) {
        let mut state = self.write_state();
        let queue = state
            .queues
            .entry(name.to_string())
            .or_insert_with(|| MemoryQueue::new(true));
        queue.ready.push_back(StoredMessage {
            body: Bytes::from(body.to_string()),
        });
    }

    /// Make every subsequent publish fail at the broker
    pub fn fail_publishes(&self) {
        self.write_state().fail_publishes = true;
    }

    /// Accept publishes without enqueuing the message
    ///
    /// Simulates the mandatory-publish/visibility inconsistency where a
    /// published message is not observable via an immediate fetch.
    pub fn swallow_publishes(&self) {
        self.write_state().swallow_publishes = true;
    }

    // ------------------------------------------------------------------------
    // Test observation hooks
    // ------------------------------------------------------------------------

    pub fn queue_exists(&self, name: &str) -> bool {
        self.read_state().queues.contains_key(name)
    }

    pub fn queue_is_durable(&self, name: &str) -> Option<bool> {
        self.read_state().queues.get(name).map(|queue| queue.durable)
    }

    pub fn ready_count(&self, name: &str) -> u32 {
        self.read_state()
            .queues
            .get(name)
            .map(|queue| queue.ready.len() as u32)
            .unwrap_or(0)
    }

    /// Properties of publishes accepted on the queue, in publish order
    pub fn published_properties(&self, name: &str) -> Vec<MessageProperties> {
        self.read_state()
            .queues
            .get(name)
            .map(|queue| queue.published.clone())
            .unwrap_or_default()
    }

    pub fn last_prefetch(&self) -> Option<u16> {
        self.read_state().last_prefetch
    }

    pub fn connect_count(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    pub fn publish_count(&self) -> usize {
        self.counters.publishes.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.counters.fetches.load(Ordering::SeqCst)
    }

    pub fn nack_count(&self) -> usize {
        self.counters.nacks.load(Ordering::SeqCst)
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerConnector for MemoryBroker {
    async fn connect(
        &self,
        _endpoint: &BrokerEndpoint,
    ) -> Result<Box<dyn BrokerConnection>, BrokerError> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
            counters: Arc::clone(&self.counters),
        }))
    }
}

// ============================================================================
// Connection and Channel
// ============================================================================

struct MemoryConnection {
    state: Arc<RwLock<BrokerState>>,
    counters: Arc<BrokerCounters>,
}

#[async_trait]
impl BrokerConnection for MemoryConnection {
    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, BrokerError> {
        Ok(Box::new(MemoryChannel {
            state: Arc::clone(&self.state),
            counters: Arc::clone(&self.counters),
        }))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}

struct MemoryChannel {
    state: Arc<RwLock<BrokerState>>,
    counters: Arc<BrokerCounters>,
}

impl MemoryChannel {
    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, BrokerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    async fn set_prefetch(&self, prefetch: u16) -> Result<(), BrokerError> {
        self.write_state().last_prefetch = Some(prefetch);
        Ok(())
    }

    async fn declare_passive(&self, queue: &QueueName) -> Result<PassiveDeclare, BrokerError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        match state.queues.get(queue.as_str()) {
            Some(existing) => Ok(PassiveDeclare::Found(existing.info())),
            None => Ok(PassiveDeclare::NotFound),
        }
    }

    async fn declare_active(
        &self,
        queue: &QueueName,
        durable: bool,
    ) -> Result<QueueInfo, BrokerError> {
        let mut state = self.write_state();
        let entry = state
            .queues
            .entry(queue.to_string())
            .or_insert_with(|| MemoryQueue::new(durable));
        Ok(entry.info())
    }

    async fn publish(
        &self,
        queue: &QueueName,
        properties: MessageProperties,
        body: Bytes,
        _mandatory: bool,
    ) -> Result<(), BrokerError> {
        self.counters.publishes.fetch_add(1, Ordering::SeqCst);

        let mut state = self.write_state();
        if state.fail_publishes {
            return Err(BrokerError::PublishRejected {
                queue_name: queue.to_string(),
                message: "broker rejected the publish".to_string(),
            });
        }

        let swallow = state.swallow_publishes;
        let entry = state
            .queues
            .entry(queue.to_string())
            .or_insert_with(|| MemoryQueue::new(true));
        entry.published.push(properties);
        if !swallow {
            entry.ready.push_back(StoredMessage { body });
        }
        Ok(())
    }

    async fn fetch_one(&self, queue: &QueueName) -> Result<Option<Delivery>, BrokerError> {
        self.counters.fetches.fetch_add(1, Ordering::SeqCst);

        let mut state = self.write_state();
        let tag = state.next_delivery_tag;
        let Some(entry) = state.queues.get_mut(queue.as_str()) else {
            return Ok(None);
        };
        let Some(message) = entry.ready.pop_front() else {
            return Ok(None);
        };

        let delivery = Delivery {
            delivery_tag: tag,
            body: message.body.clone(),
        };
        state.next_delivery_tag += 1;
        state.in_flight.insert(tag, (queue.to_string(), message));
        Ok(Some(delivery))
    }

    async fn nack_requeue(&self, delivery_tag: u64) -> Result<(), BrokerError> {
        self.counters.nacks.fetch_add(1, Ordering::SeqCst);

        let mut state = self.write_state();
        let Some((queue_name, message)) = state.in_flight.remove(&delivery_tag) else {
            return Err(BrokerError::NackFailed {
                delivery_tag,
                message: "unknown delivery tag".to_string(),
            });
        };

        // Requeued messages rejoin at the back so an interleaved
        // fetch/nack sampling pass walks the queue in order while the
        // ready count is left unchanged once the pass completes.
        if let Some(entry) = state.queues.get_mut(&queue_name) {
            entry.ready.push_back(message);
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}
