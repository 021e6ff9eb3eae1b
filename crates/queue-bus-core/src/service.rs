//! Queue operation engine.
//!
//! Executes the three supported operations against the broker using the
//! currently effective configuration: send (publish then verify presence
//! without consuming), publish (fire-and-forget), and the status query.
//! Each call opens its own broker connection and channel and releases both
//! on every exit path.

use crate::config::ConnectionConfig;
use crate::context::ConnectionContext;
use crate::event_log::{EventLevel, EventLog};
use crate::outcome::OperationOutcome;
use crate::request::{OperationKind, OperationRequest, QueueStatusDetail, StatusRequest};
use broker_runtime::{
    BrokerChannel, BrokerConnection, BrokerConnector, BrokerError, DeliveryMode,
    MessageProperties, PassiveDeclare, QueueInfo, QueueName,
};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::error;
use uuid::Uuid;

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;

const COMPONENT: &str = "QueueOperationService";

const CANCELLED_MESSAGE: &str = "the operation was cancelled before it started";

/// Faults raised between queue resolution and broker teardown
///
/// These never reach the caller directly: each operation's boundary converts
/// them into one generic failure outcome and records the detail through the
/// event log.
#[derive(Debug, Error)]
enum OperationError {
    #[error("no valid queue name was provided by the request or the configuration")]
    MissingQueueName,

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("the message content could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Connection/channel pair scoped to a single operation
struct BrokerSession {
    connection: Box<dyn BrokerConnection>,
    channel: Box<dyn BrokerChannel>,
}

impl BrokerSession {
    /// Release both resources; close errors do not override the operation result
    async fn release(self) {
        let _ = self.channel.close().await;
        let _ = self.connection.close().await;
    }
}

/// Engine executing send, publish, and status operations against the broker
pub struct QueueOperationService {
    context: Arc<ConnectionContext>,
    connector: Arc<dyn BrokerConnector>,
    event_log: Arc<dyn EventLog>,
}

impl QueueOperationService {
    pub fn new(
        context: Arc<ConnectionContext>,
        connector: Arc<dyn BrokerConnector>,
        event_log: Arc<dyn EventLog>,
    ) -> Self {
        Self {
            context,
            connector,
            event_log,
        }
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Send a message and verify it is readable without consuming it
    ///
    /// Publishes the content, immediately fetches one message from the same
    /// queue without auto-acknowledgement, negatively acknowledges it with
    /// requeue so it stays available to real consumers, and returns the
    /// decoded body. Refuses to publish into a queue with no attached
    /// consumers unless the request explicitly permits it.
    pub async fn send(
        &self,
        request: &OperationRequest,
        token: &CancellationToken,
    ) -> OperationOutcome<String> {
        if token.is_cancelled() {
            return OperationOutcome::failure_with(CANCELLED_MESSAGE, "the send was not performed");
        }

        let errors = request.validate(OperationKind::Send);
        if !errors.is_empty() {
            return OperationOutcome::failure(errors, "the send request is invalid");
        }

        match self.execute_send(request).await {
            Ok(outcome) => outcome,
            Err(fault) => {
                self.record_error("send", &fault, token).await;
                OperationOutcome::failure_with(
                    "an unexpected error occurred during the send operation",
                    "the send could not be completed",
                )
            }
        }
    }

    /// Publish a message without any delivery verification
    pub async fn publish(
        &self,
        request: &OperationRequest,
        token: &CancellationToken,
    ) -> OperationOutcome<bool> {
        if token.is_cancelled() {
            return OperationOutcome::failure_with(
                CANCELLED_MESSAGE,
                "the publish was not performed",
            );
        }

        let errors = request.validate(OperationKind::Publish);
        if !errors.is_empty() {
            return OperationOutcome::failure(errors, "the publish request is invalid");
        }

        match self.execute_publish(request).await {
            Ok(outcome) => outcome,
            Err(fault) => {
                self.record_error("publish", &fault, token).await;
                OperationOutcome::failure_with(
                    "an unexpected error occurred during the publish operation",
                    "the publish could not be completed",
                )
            }
        }
    }

    /// Query a queue's state, optionally sampling message bodies
    ///
    /// Sampling is non-destructive: every fetched message is negatively
    /// acknowledged with requeue, so the ready count is unchanged once the
    /// pass completes.
    pub async fn subscribe(
        &self,
        request: &StatusRequest,
        token: &CancellationToken,
    ) -> OperationOutcome<QueueStatusDetail> {
        if token.is_cancelled() {
            return OperationOutcome::failure_with(
                CANCELLED_MESSAGE,
                "the status query was not performed",
            );
        }

        let errors = request.validate();
        if !errors.is_empty() {
            return OperationOutcome::failure(errors, "the status request is invalid");
        }

        match self.execute_subscribe(request, token).await {
            Ok(outcome) => outcome,
            Err(fault) => {
                self.record_error("subscribe", &fault, token).await;
                OperationOutcome::failure_with(
                    "an unexpected error occurred during the subscribe operation",
                    "the status query could not be completed",
                )
            }
        }
    }

    // ------------------------------------------------------------------------
    // Protocol execution
    // ------------------------------------------------------------------------

    async fn execute_send(
        &self,
        request: &OperationRequest,
    ) -> Result<OperationOutcome<String>, OperationError> {
        let config = self.context.current();
        let queue = resolve_queue_name(request.queue_name.as_deref(), &config)?;

        let session = self.open_session(&config).await?;
        let result = self.send_on_session(&session, &config, &queue, request).await;
        session.release().await;
        result
    }

    async fn send_on_session(
        &self,
        session: &BrokerSession,
        config: &ConnectionConfig,
        queue: &QueueName,
        request: &OperationRequest,
    ) -> Result<OperationOutcome<String>, OperationError> {
        let info = resolve_queue(session, queue, config).await?;

        if info.consumer_count == 0 && !request.allow_publish_without_subscribers {
            return Ok(OperationOutcome::failure_with(
                "no active subscriber is listening on the requested queue",
                "the send could not be completed",
            ));
        }

        let body = encode_content(request)?;
        let properties = build_properties(request, config);
        session
            .channel
            .publish(queue, properties, body, true)
            .await?;

        // The publish has been issued: the verification fetch and requeue
        // run to completion even if cancellation fires, so the message is
        // never left unverified mid-operation.
        let Some(delivery) = session.channel.fetch_one(queue).await? else {
            return Ok(OperationOutcome::failure_with(
                "the message is not available in the queue",
                "the send could not be completed",
            ));
        };

        let text = decode_body(&delivery.body);
        session.channel.nack_requeue(delivery.delivery_tag).await?;

        Ok(OperationOutcome::success(
            text,
            "message sent and available to subscribers",
        ))
    }

    async fn execute_publish(
        &self,
        request: &OperationRequest,
    ) -> Result<OperationOutcome<bool>, OperationError> {
        let config = self.context.current();
        let queue = resolve_queue_name(request.queue_name.as_deref(), &config)?;

        let session = self.open_session(&config).await?;
        let result = self
            .publish_on_session(&session, &config, &queue, request)
            .await;
        session.release().await;
        result
    }

    async fn publish_on_session(
        &self,
        session: &BrokerSession,
        config: &ConnectionConfig,
        queue: &QueueName,
        request: &OperationRequest,
    ) -> Result<OperationOutcome<bool>, OperationError> {
        resolve_queue(session, queue, config).await?;

        let body = encode_content(request)?;
        let properties = build_properties(request, config);
        session
            .channel
            .publish(queue, properties, body, true)
            .await?;

        Ok(OperationOutcome::success(true, "message published to the queue"))
    }

    async fn execute_subscribe(
        &self,
        request: &StatusRequest,
        token: &CancellationToken,
    ) -> Result<OperationOutcome<QueueStatusDetail>, OperationError> {
        let config = self.context.current();
        let queue = resolve_queue_name(request.queue_name.as_deref(), &config)?;

        let session = self.open_session(&config).await?;
        let result = self
            .subscribe_on_session(&session, &config, &queue, request, token)
            .await;
        session.release().await;
        result
    }

    async fn subscribe_on_session(
        &self,
        session: &BrokerSession,
        config: &ConnectionConfig,
        queue: &QueueName,
        request: &StatusRequest,
        token: &CancellationToken,
    ) -> Result<OperationOutcome<QueueStatusDetail>, OperationError> {
        let info = resolve_queue(session, queue, config).await?;

        let mut samples = Vec::new();
        if request.include_content && info.ready_count > 0 {
            let limit = request.max_messages.min(info.ready_count);
            for _ in 0..limit {
                if token.is_cancelled() {
                    break;
                }

                let Some(delivery) = session.channel.fetch_one(queue).await? else {
                    break;
                };

                samples.push(decode_body(&delivery.body));
                session.channel.nack_requeue(delivery.delivery_tag).await?;
            }
        }

        let detail = QueueStatusDetail {
            queue_name: queue.to_string(),
            ready_messages: info.ready_count,
            consumer_count: info.consumer_count,
            message_samples: samples,
        };

        Ok(OperationOutcome::success(
            detail,
            "queue status retrieved successfully",
        ))
    }

    // ------------------------------------------------------------------------
    // Session handling and error reporting
    // ------------------------------------------------------------------------

    /// Open a connection and channel for exactly one operation
    async fn open_session(&self, config: &ConnectionConfig) -> Result<BrokerSession, OperationError> {
        let connection = self.connector.connect(&config.endpoint()).await?;
        let channel = match connection.open_channel().await {
            Ok(channel) => channel,
            Err(fault) => {
                let _ = connection.close().await;
                return Err(fault.into());
            }
        };

        Ok(BrokerSession {
            connection,
            channel,
        })
    }

    async fn record_error(&self, method: &str, fault: &OperationError, token: &CancellationToken) {
        error!(component = COMPONENT, method, error = %fault, "queue operation failed");
        self.event_log
            .log(
                EventLevel::Error,
                COMPONENT,
                method,
                &fault.to_string(),
                Some(&format!("{:?}", fault)),
                token,
            )
            .await;
    }
}

// ============================================================================
// Protocol helpers
// ============================================================================

/// Apply quality-of-service and resolve the target queue
///
/// The queue is checked passively first; only the broker's explicit
/// not-found signal triggers the fallback to an active declaration with the
/// configuration's durability. Any other declare fault propagates.
async fn resolve_queue(
    session: &BrokerSession,
    queue: &QueueName,
    config: &ConnectionConfig,
) -> Result<QueueInfo, OperationError> {
    if config.prefetch > 0 {
        session.channel.set_prefetch(config.prefetch).await?;
    }

    match session.channel.declare_passive(queue).await? {
        PassiveDeclare::Found(info) => Ok(info),
        PassiveDeclare::NotFound => Ok(session
            .channel
            .declare_active(queue, config.persistent_messages)
            .await?),
    }
}

/// Effective queue name: explicit request name, else the configured default
fn resolve_queue_name(
    requested: Option<&str>,
    config: &ConnectionConfig,
) -> Result<QueueName, OperationError> {
    let explicit = requested.map(str::trim).filter(|name| !name.is_empty());
    let name = explicit.unwrap_or_else(|| config.default_queue.trim());

    if name.is_empty() {
        return Err(OperationError::MissingQueueName);
    }

    Ok(QueueName::new(name.to_string())?)
}

/// UTF-8 bytes of the content's canonical JSON text
fn encode_content(request: &OperationRequest) -> Result<Bytes, OperationError> {
    let content = request
        .content
        .as_ref()
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    let text = serde_json::to_string(&content)?;
    Ok(Bytes::from(text))
}

fn decode_body(body: &Bytes) -> String {
    String::from_utf8_lossy(body).into_owned()
}

/// Message properties for one outgoing message
fn build_properties(request: &OperationRequest, config: &ConnectionConfig) -> MessageProperties {
    MessageProperties::new(
        Uuid::new_v4().simple().to_string(),
        config.connection_name.clone(),
        DeliveryMode::from_durable(config.persistent_messages),
    )
    .with_headers(request.header_metadata())
}
