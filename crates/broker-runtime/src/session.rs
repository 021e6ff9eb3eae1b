//! Session traits and endpoint configuration for broker access.
//!
//! The queue engine drives every operation through these traits: open one
//! connection, open one channel on it, perform the declare/operate protocol,
//! and close both. No pooling or reuse happens at this layer.

use crate::error::BrokerError;
use crate::message::{Delivery, MessageProperties, PassiveDeclare, QueueInfo, QueueName};
use async_trait::async_trait;
use bytes::Bytes;

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

// ============================================================================
// Endpoint Configuration
// ============================================================================

/// Connection parameters for a single broker endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub virtual_host: String,
    /// Client-provided connection name reported to the broker
    pub connection_name: String,
    pub use_tls: bool,
    pub connect_timeout_secs: u64,
}

impl BrokerEndpoint {
    /// Render the endpoint as an AMQP URI
    ///
    /// The virtual host segment is percent-encoded; the default vhost `/`
    /// becomes `%2F`.
    pub fn amqp_uri(&self) -> String {
        let scheme = if self.use_tls { "amqps" } else { "amqp" };
        format!(
            "{}://{}:{}@{}:{}/{}",
            scheme,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password),
            self.host,
            self.port,
            urlencoding::encode(&self.virtual_host),
        )
    }
}

// ============================================================================
// Session Traits
// ============================================================================

/// Factory for live broker connections
///
/// One connection is produced per engine call; the connector itself holds no
/// connection state.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Open a connection to the endpoint
    async fn connect(
        &self,
        endpoint: &BrokerEndpoint,
    ) -> Result<Box<dyn BrokerConnection>, BrokerError>;
}

/// A live broker connection
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Open a channel on this connection
    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, BrokerError>;

    /// Close the connection
    async fn close(&self) -> Result<(), BrokerError>;
}

/// A channel scoped to a single engine call
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Set the per-channel prefetch count before any publish/consume activity
    async fn set_prefetch(&self, prefetch: u16) -> Result<(), BrokerError>;

    /// Check whether a queue exists without creating it
    async fn declare_passive(&self, queue: &QueueName) -> Result<PassiveDeclare, BrokerError>;

    /// Create a queue if absent (non-exclusive, no auto-delete, no arguments)
    async fn declare_active(
        &self,
        queue: &QueueName,
        durable: bool,
    ) -> Result<QueueInfo, BrokerError>;

    /// Publish bytes with properties to the queue via the default exchange
    async fn publish(
        &self,
        queue: &QueueName,
        properties: MessageProperties,
        body: Bytes,
        mandatory: bool,
    ) -> Result<(), BrokerError>;

    /// Fetch one message without auto-acknowledgement, if any is ready
    async fn fetch_one(&self, queue: &QueueName) -> Result<Option<Delivery>, BrokerError>;

    /// Negatively acknowledge a delivery and return it to the queue
    async fn nack_requeue(&self, delivery_tag: u64) -> Result<(), BrokerError>;

    /// Close the channel
    async fn close(&self) -> Result<(), BrokerError>;
}
