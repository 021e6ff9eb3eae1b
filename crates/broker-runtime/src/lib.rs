//! # Broker Runtime
//!
//! Broker session layer for queue-bus: a small capability surface over an
//! AMQP broker, limited to the operations the queue engine needs.
//!
//! This library provides:
//! - Session traits modelling "open a connection, open a channel, operate"
//! - Passive/active queue declaration with an explicit not-found signal
//! - Mandatory publish, single-message fetch, and negative-ack with requeue
//! - An AMQP (lapin) provider and an in-memory provider for tests
//!
//! ## Module Organization
//!
//! - [error] - Error types for all broker operations
//! - [message] - Queue names, message properties, and delivery types
//! - [session] - Connector/connection/channel traits and endpoint config
//! - [providers] - AMQP and in-memory implementations

// Module declarations
pub mod error;
pub mod message;
pub mod providers;
pub mod session;

// Re-export commonly used types at crate root for convenience
pub use error::BrokerError;
pub use message::{Delivery, DeliveryMode, MessageProperties, PassiveDeclare, QueueInfo, QueueName};
pub use providers::{AmqpConnector, MemoryBroker};
pub use session::{BrokerChannel, BrokerConnection, BrokerConnector, BrokerEndpoint};
