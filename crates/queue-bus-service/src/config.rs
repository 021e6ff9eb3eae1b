//! Configuration for the HTTP service.

use queue_bus_core::{ConnectionConfig, EventLogConfig};
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Broker connection applied at startup and on configuration reloads
    pub broker: ConnectionConfig,

    /// Event log settings
    pub event_log: EventLogConfig,
}

impl ServiceConfig {
    /// Validate the configuration, returning every violated rule
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.broker.validate();

        if self.server.port == 0 {
            errors.push("the server port must be greater than zero".to_string());
        }

        errors
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Load the service configuration from files and the environment
///
/// Sources, later ones overriding earlier ones:
///  1. /etc/queue-bus/service.yaml   — system-wide defaults
///  2. ./config/service.yaml         — deployment-local override
///  3. Path given by QB_CONFIG_FILE  — operator-specified file
///  4. Environment variables prefixed QB__ (double-underscore separator),
///     e.g. QB__SERVER__PORT=9090 sets server.port = 9090
///
/// Every field carries a serde default, so an entirely unconfigured
/// environment yields a valid configuration. A malformed file or an
/// environment variable that cannot be coerced to the right type is a hard
/// error: it indicates deliberate-but-broken operator configuration.
pub fn load() -> Result<ServiceConfig, config::ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/queue-bus/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Ok(explicit_path) = std::env::var("QB_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            builder = builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }
    }

    builder
        .add_source(config::Environment::with_prefix("QB").separator("__"))
        .build()?
        .try_deserialize()
}
