//! Request and status types for queue operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;

/// Maximum queue name length accepted on requests
const MAX_QUEUE_NAME_LENGTH: usize = 255;

/// Upper bound on messages sampled by one status query
const MAX_SAMPLED_MESSAGES: u32 = 500;

/// Which queue operation a request is validated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Send,
    Publish,
}

impl OperationKind {
    /// Lower-case operation name used in messages and log events
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Publish => "publish",
        }
    }
}

// ============================================================================
// Operation Request
// ============================================================================

/// Request to send or publish one message to a queue
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OperationRequest {
    /// Target queue; falls back to the configuration's default queue
    pub queue_name: Option<String>,
    /// Structured payload, opaque beyond re-serialization
    pub content: Option<Value>,
    /// Permit publishing when no consumers are attached (send only)
    pub allow_publish_without_subscribers: bool,
    /// Metadata copied into message headers; keys are case-insensitive
    pub metadata: HashMap<String, Option<String>>,
}

impl OperationRequest {
    /// Validate the request, returning every violated rule
    pub fn validate(&self, kind: OperationKind) -> Vec<String> {
        let mut errors = Vec::new();

        let content_missing = match &self.content {
            None => true,
            Some(Value::Null) => true,
            Some(_) => false,
        };
        if content_missing {
            errors.push(format!(
                "the message content is required for the {} operation",
                kind.as_str()
            ));
        }

        if let Some(name) = &self.queue_name {
            if !name.trim().is_empty() && name.len() > MAX_QUEUE_NAME_LENGTH {
                errors.push(format!(
                    "the queue name must not exceed {} characters",
                    MAX_QUEUE_NAME_LENGTH
                ));
            }
        }

        if self.metadata.keys().any(|key| key.trim().is_empty()) {
            errors.push("metadata entries must have non-blank keys".to_string());
        }

        errors
    }

    /// Metadata normalized for message headers
    ///
    /// Keys are lower-cased (metadata keys are case-insensitive) and absent
    /// values become empty strings. Blank keys are skipped; validation has
    /// already rejected them on the main path.
    pub fn header_metadata(&self) -> HashMap<String, String> {
        self.metadata
            .iter()
            .filter(|(key, _)| !key.trim().is_empty())
            .map(|(key, value)| {
                (
                    key.trim().to_ascii_lowercase(),
                    value.clone().unwrap_or_default(),
                )
            })
            .collect()
    }
}

// ============================================================================
// Status Request
// ============================================================================

/// Request to inspect a queue's state
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusRequest {
    /// Target queue; falls back to the configuration's default queue
    pub queue_name: Option<String>,
    /// Sample message bodies in addition to the counts
    pub include_content: bool,
    /// Maximum messages to sample (1-500)
    pub max_messages: u32,
}

impl Default for StatusRequest {
    fn default() -> Self {
        Self {
            queue_name: None,
            include_content: true,
            max_messages: 50,
        }
    }
}

impl StatusRequest {
    /// Validate the request, returning every violated rule
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Some(name) = &self.queue_name {
            if !name.trim().is_empty() && name.len() > MAX_QUEUE_NAME_LENGTH {
                errors.push(format!(
                    "the queue name must not exceed {} characters",
                    MAX_QUEUE_NAME_LENGTH
                ));
            }
        }

        if self.max_messages == 0 {
            errors.push("the maximum number of messages to sample must be greater than zero".to_string());
        } else if self.max_messages > MAX_SAMPLED_MESSAGES {
            errors.push(format!(
                "at most {} messages may be sampled per query",
                MAX_SAMPLED_MESSAGES
            ));
        }

        errors
    }
}

// ============================================================================
// Queue Status Detail
// ============================================================================

/// Snapshot of a queue's state returned by the status query
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatusDetail {
    /// Resolved queue name the query ran against
    pub queue_name: String,
    /// Messages ready for delivery
    pub ready_messages: u32,
    /// Consumers currently attached
    pub consumer_count: u32,
    /// Decoded message bodies sampled without consuming them
    pub message_samples: Vec<String>,
}

impl QueueStatusDetail {
    /// Whether anything is on the queue or being processed
    pub fn has_messages(&self) -> bool {
        self.ready_messages > 0 || self.consumer_count > 0
    }
}
