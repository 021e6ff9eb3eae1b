//! Error types for broker operations.

use thiserror::Error;

/// Comprehensive error type for all broker operations
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Connection attempt timed out after {seconds}s")]
    ConnectTimeout { seconds: u64 },

    #[error("Channel failed: {message}")]
    ChannelFailed { message: String },

    #[error("Queue declaration failed for '{queue_name}': {message}")]
    DeclareFailed { queue_name: String, message: String },

    #[error("Publish rejected on '{queue_name}': {message}")]
    PublishRejected { queue_name: String, message: String },

    #[error("Fetch failed on '{queue_name}': {message}")]
    FetchFailed { queue_name: String, message: String },

    #[error("Negative acknowledgement failed for delivery {delivery_tag}: {message}")]
    NackFailed { delivery_tag: u64, message: String },

    #[error("Invalid queue name: {reason}")]
    InvalidQueueName { reason: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },
}

impl BrokerError {
    /// Check if error is transient and a later retry could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } => true,
            Self::ConnectTimeout { .. } => true,
            Self::ChannelFailed { .. } => true,
            Self::DeclareFailed { .. } => false,
            Self::PublishRejected { .. } => true,
            Self::FetchFailed { .. } => true,
            Self::NackFailed { .. } => false,
            Self::InvalidQueueName { .. } => false,
            Self::Protocol { .. } => false,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
