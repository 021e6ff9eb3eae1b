//! Broker connection configuration.

use broker_runtime::BrokerEndpoint;
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Immutable snapshot of broker connection parameters and default policy
///
/// Constructed from the external configuration source at startup and
/// replaceable at runtime through [`crate::ConnectionContext`]. Instances
/// that fail [`ConnectionConfig::validate`] are never installed as the
/// active snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Client-provided connection name reported to the broker
    pub connection_name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub virtual_host: String,
    /// Queue used when a request does not name one
    pub default_queue: String,
    pub use_tls: bool,
    /// Per-channel prefetch count, applied when greater than zero
    pub prefetch: u16,
    /// Publish with persistent delivery mode and declare durable queues
    pub persistent_messages: bool,
    pub connect_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_name: "primary-connection".to_string(),
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            password: "guest".to_string(),
            virtual_host: "/".to_string(),
            default_queue: String::new(),
            use_tls: false,
            prefetch: 1,
            persistent_messages: true,
            connect_timeout_secs: 30,
        }
    }
}

impl ConnectionConfig {
    /// Validate the configuration, returning every violated rule
    ///
    /// An empty vector means the configuration is acceptable as the active
    /// snapshot.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host.trim().is_empty() {
            errors.push("the broker host is required".to_string());
        }

        if self.port == 0 {
            errors.push("the configured port must be greater than zero".to_string());
        }

        if self.username.trim().is_empty() {
            errors.push("the broker username is required".to_string());
        }

        if self.password.trim().is_empty() {
            errors.push("the broker password is required".to_string());
        }

        if self.default_queue.trim().is_empty() {
            errors.push("a default queue must be defined".to_string());
        }

        if self.prefetch == 0 {
            errors.push("the prefetch count must be one or greater".to_string());
        }

        if self.connect_timeout_secs == 0 {
            errors.push("the connect timeout must be greater than zero".to_string());
        }

        errors
    }

    /// Convert to the broker endpoint used to open a session
    pub fn endpoint(&self) -> BrokerEndpoint {
        BrokerEndpoint {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            virtual_host: self.virtual_host.clone(),
            connection_name: self.connection_name.clone(),
            use_tls: self.use_tls,
            connect_timeout_secs: self.connect_timeout_secs.max(1),
        }
    }
}
