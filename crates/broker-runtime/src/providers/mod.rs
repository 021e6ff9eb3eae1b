//! Broker provider implementations.

pub mod amqp;
pub mod memory;

pub use amqp::AmqpConnector;
pub use memory::MemoryBroker;
