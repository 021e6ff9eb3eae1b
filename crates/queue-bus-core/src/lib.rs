//! # Queue-Bus Core
//!
//! Core logic for the queue-bus message-broker front-end: the hot-swappable
//! connection context and the queue-operation engine that turns validated
//! requests into per-call broker sessions.
//!
//! ## Architecture
//!
//! The engine depends only on trait abstractions:
//! - broker access goes through `broker_runtime::BrokerConnector`
//! - structured event logging goes through [`event_log::EventLog`]
//!
//! Concrete implementations are injected at wiring time, which keeps every
//! operation testable against the in-memory broker.

// Module declarations
pub mod config;
pub mod context;
pub mod event_log;
pub mod outcome;
pub mod request;
pub mod service;

// Re-export commonly used types at crate root for convenience
pub use config::ConnectionConfig;
pub use context::ConnectionContext;
pub use event_log::{EventLevel, EventLog, EventLogConfig, FileEventLog, NoopEventLog};
pub use outcome::OperationOutcome;
pub use request::{OperationKind, OperationRequest, QueueStatusDetail, StatusRequest};
pub use service::QueueOperationService;
