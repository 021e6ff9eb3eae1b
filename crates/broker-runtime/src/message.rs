//! Queue names, message properties, and delivery types.

use crate::error::BrokerError;
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

// ============================================================================
// Queue Name
// ============================================================================

/// Validated queue name with AMQP length restrictions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    /// Maximum queue name length permitted by the AMQP 0.9.1 spec
    pub const MAX_LENGTH: usize = 255;

    /// Create new queue name with validation
    pub fn new(name: String) -> Result<Self, BrokerError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(BrokerError::InvalidQueueName {
                reason: "queue name must not be blank".to_string(),
            });
        }

        if trimmed.len() > Self::MAX_LENGTH {
            return Err(BrokerError::InvalidQueueName {
                reason: format!("queue name must not exceed {} characters", Self::MAX_LENGTH),
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

// ============================================================================
// Message Properties
// ============================================================================

/// Delivery mode carried on published messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Message survives only as long as the broker process
    Transient,
    /// Message is written to disk on durable queues
    Persistent,
}

impl DeliveryMode {
    /// Map a durability flag to the matching delivery mode
    pub fn from_durable(durable: bool) -> Self {
        if durable {
            Self::Persistent
        } else {
            Self::Transient
        }
    }

    /// AMQP wire value (1 = transient, 2 = persistent)
    pub fn as_wire_value(&self) -> u8 {
        match self {
            Self::Transient => 1,
            Self::Persistent => 2,
        }
    }
}

/// Properties attached to a published message
#[derive(Debug, Clone)]
pub struct MessageProperties {
    pub content_type: String,
    pub delivery_mode: DeliveryMode,
    pub message_id: String,
    pub app_id: String,
    /// Unix timestamp in seconds, UTC
    pub timestamp: u64,
    pub headers: HashMap<String, String>,
}

impl MessageProperties {
    /// Create properties with the current UTC timestamp
    pub fn new(message_id: String, app_id: String, delivery_mode: DeliveryMode) -> Self {
        Self {
            content_type: "application/json".to_string(),
            delivery_mode,
            message_id,
            app_id,
            timestamp: Utc::now().timestamp().max(0) as u64,
            headers: HashMap::new(),
        }
    }

    /// Override the content type
    pub fn with_content_type(mut self, content_type: String) -> Self {
        self.content_type = content_type;
        self
    }

    /// Add a message header
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Replace all message headers
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

// ============================================================================
// Declare Results and Deliveries
// ============================================================================

/// Counts reported by the broker when a queue is declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueInfo {
    /// Messages ready for delivery (not yet fetched)
    pub ready_count: u32,
    /// Consumers currently attached to the queue
    pub consumer_count: u32,
}

/// Outcome of a passive queue declaration
///
/// The broker's "queue does not exist" fault is control flow, not an error:
/// callers match on `NotFound` to fall back to an active declaration. Any
/// other broker fault surfaces as a [`BrokerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassiveDeclare {
    /// Queue exists; counts reflect its current state
    Found(QueueInfo),
    /// No queue with the requested name is provisioned
    NotFound,
}

/// A message fetched from a queue without auto-acknowledgement
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Broker-assigned tag used to acknowledge or reject this delivery
    pub delivery_tag: u64,
    pub body: Bytes,
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
