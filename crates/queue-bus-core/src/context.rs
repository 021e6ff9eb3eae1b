//! Process-wide holder of the current and default connection configuration.

use crate::config::ConnectionConfig;
use crate::event_log::{EventLevel, EventLog};
use crate::outcome::OperationOutcome;
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;

const COMPONENT: &str = "ConnectionContext";

/// Both snapshots guarded together so swaps are atomic relative to readers
struct Snapshots {
    current: ConnectionConfig,
    default: ConnectionConfig,
}

/// Single source of truth for "which broker, which defaults"
///
/// Many in-flight operations read the active snapshot concurrently while
/// administrative updates and external configuration reloads occasionally
/// write; a reader-writer lock serializes only the swap itself. Validation
/// of an incoming configuration runs outside any lock.
///
/// At all times exactly one current and one default snapshot exist, and both
/// are valid configs (a safe built-in configuration applies before any
/// external source is consulted).
pub struct ConnectionContext {
    snapshots: RwLock<Snapshots>,
    event_log: Arc<dyn EventLog>,
}

impl ConnectionContext {
    /// Create a context from the configuration source's initial value
    ///
    /// `None` (a source that yields nothing) normalizes to the built-in
    /// defaults.
    pub fn new(initial: Option<ConnectionConfig>, event_log: Arc<dyn EventLog>) -> Self {
        let initial = Self::normalize(initial);
        Self {
            snapshots: RwLock::new(Snapshots {
                current: initial.clone(),
                default: initial,
            }),
            event_log,
        }
    }

    /// Get the active configuration snapshot
    pub fn current(&self) -> ConnectionConfig {
        self.read().current.clone()
    }

    /// Replace the active configuration
    ///
    /// The incoming configuration is validated first; on any violation a
    /// failure outcome lists every broken rule and the context is left
    /// untouched. On success the active snapshot is swapped atomically, an
    /// informational event naming the new default queue is emitted, and the
    /// now-current snapshot is returned.
    pub async fn update(
        &self,
        new_config: ConnectionConfig,
        token: &CancellationToken,
    ) -> OperationOutcome<ConnectionConfig> {
        let errors = new_config.validate();
        if !errors.is_empty() {
            return OperationOutcome::failure(errors, "the received configuration is invalid");
        }

        let default_queue = new_config.default_queue.clone();
        {
            let mut snapshots = self.write();
            snapshots.current = new_config;
        }

        self.event_log
            .log(
                EventLevel::Information,
                COMPONENT,
                "update",
                &format!("active connection updated to queue '{}'", default_queue),
                None,
                token,
            )
            .await;

        OperationOutcome::success(self.current(), "connection updated")
    }

    /// Restore the active configuration to the last-known-valid default
    ///
    /// Unconditional: the default snapshot always exists and is always valid.
    pub async fn reset_to_default(
        &self,
        token: &CancellationToken,
    ) -> OperationOutcome<ConnectionConfig> {
        let restored = {
            let mut snapshots = self.write();
            snapshots.current = snapshots.default.clone();
            snapshots.current.clone()
        };

        self.event_log
            .log(
                EventLevel::Information,
                COMPONENT,
                "reset_to_default",
                &format!(
                    "active connection restored to the default configuration '{}'",
                    restored.default_queue
                ),
                None,
                token,
            )
            .await;

        OperationOutcome::success(restored, "connection restored to the default configuration")
    }

    /// React to an external "configuration source changed" notification
    ///
    /// Replaces only the default snapshot; an administratively-set current
    /// snapshot stays in effect until an explicit reset. A source that
    /// yields nothing substitutes the built-in defaults.
    pub fn replace_default(&self, config: Option<ConnectionConfig>) {
        let normalized = Self::normalize(config);
        let mut snapshots = self.write();
        snapshots.default = normalized;
    }

    fn normalize(config: Option<ConnectionConfig>) -> ConnectionConfig {
        config.unwrap_or_default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Snapshots> {
        self.snapshots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Snapshots> {
        self.snapshots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
