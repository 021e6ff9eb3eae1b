//! AMQP broker provider backed by lapin.
//!
//! One [`AmqpConnection`] maps to one AMQP connection; channels are opened
//! per engine call and never shared. The passive-declare path translates the
//! broker's 404 fault into [`PassiveDeclare::NotFound`]; because a failed
//! passive declare closes the underlying AMQP channel, a replacement channel
//! is opened transparently before the caller proceeds.

use crate::error::BrokerError;
use crate::message::{Delivery, MessageProperties, PassiveDeclare, QueueInfo, QueueName};
use crate::session::{BrokerChannel, BrokerConnection, BrokerConnector, BrokerEndpoint};
use async_trait::async_trait;
use bytes::Bytes;
use lapin::options::{
    BasicGetOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions, QueueDeclareOptions,
};
use lapin::protocol::{AMQPErrorKind, AMQPSoftError};
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, ConnectionProperties};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// AMQP reply code sent with clean closes
const REPLY_SUCCESS: u16 = 200;

/// Check whether a lapin error is the queue-not-found soft fault
fn is_not_found(error: &lapin::Error) -> bool {
    matches!(
        error,
        lapin::Error::ProtocolError(amqp)
            if matches!(amqp.kind(), AMQPErrorKind::Soft(AMQPSoftError::NOTFOUND))
    )
}

// ============================================================================
// Connector
// ============================================================================

/// Connector producing live AMQP connections
#[derive(Debug, Default)]
pub struct AmqpConnector;

impl AmqpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrokerConnector for AmqpConnector {
    async fn connect(
        &self,
        endpoint: &BrokerEndpoint,
    ) -> Result<Box<dyn BrokerConnection>, BrokerError> {
        let uri = endpoint.amqp_uri();
        let properties = ConnectionProperties::default()
            .with_connection_name(LongString::from(endpoint.connection_name.clone()));

        let seconds = endpoint.connect_timeout_secs.max(1);
        let attempt = lapin::Connection::connect(&uri, properties);
        let connection = match tokio::time::timeout(Duration::from_secs(seconds), attempt).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(error)) => {
                return Err(BrokerError::ConnectionFailed {
                    message: error.to_string(),
                })
            }
            Err(_) => return Err(BrokerError::ConnectTimeout { seconds }),
        };

        debug!(host = %endpoint.host, port = endpoint.port, "opened broker connection");

        Ok(Box::new(AmqpConnection {
            inner: Arc::new(connection),
        }))
    }
}

// ============================================================================
// Connection
// ============================================================================

struct AmqpConnection {
    inner: Arc<lapin::Connection>,
}

#[async_trait]
impl BrokerConnection for AmqpConnection {
    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, BrokerError> {
        let channel = self
            .inner
            .create_channel()
            .await
            .map_err(|error| BrokerError::ChannelFailed {
                message: error.to_string(),
            })?;

        Ok(Box::new(AmqpChannel {
            connection: Arc::clone(&self.inner),
            channel: Mutex::new(channel),
            prefetch: Mutex::new(None),
        }))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.inner
            .close(REPLY_SUCCESS, "closing")
            .await
            .map_err(|error| BrokerError::ConnectionFailed {
                message: error.to_string(),
            })
    }
}

// ============================================================================
// Channel
// ============================================================================

struct AmqpChannel {
    connection: Arc<lapin::Connection>,
    channel: Mutex<lapin::Channel>,
    /// Prefetch applied to the current channel, re-applied after a reopen
    prefetch: Mutex<Option<u16>>,
}

impl AmqpChannel {
    /// Replace the channel after the broker closed it on a passive 404
    async fn reopen(&self) -> Result<(), BrokerError> {
        let fresh = self
            .connection
            .create_channel()
            .await
            .map_err(|error| BrokerError::ChannelFailed {
                message: error.to_string(),
            })?;

        if let Some(prefetch) = *self.prefetch.lock().await {
            fresh
                .basic_qos(prefetch, BasicQosOptions::default())
                .await
                .map_err(|error| BrokerError::ChannelFailed {
                    message: error.to_string(),
                })?;
        }

        *self.channel.lock().await = fresh;
        Ok(())
    }
}

#[async_trait]
impl BrokerChannel for AmqpChannel {
    async fn set_prefetch(&self, prefetch: u16) -> Result<(), BrokerError> {
        let channel = self.channel.lock().await;
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|error| BrokerError::ChannelFailed {
                message: error.to_string(),
            })?;
        *self.prefetch.lock().await = Some(prefetch);
        Ok(())
    }

    async fn declare_passive(&self, queue: &QueueName) -> Result<PassiveDeclare, BrokerError> {
        let result = {
            let channel = self.channel.lock().await;
            channel
                .queue_declare(
                    queue.as_str(),
                    QueueDeclareOptions {
                        passive: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
        };

        match result {
            Ok(declared) => Ok(PassiveDeclare::Found(QueueInfo {
                ready_count: declared.message_count(),
                consumer_count: declared.consumer_count(),
            })),
            Err(error) if is_not_found(&error) => {
                debug!(queue = %queue, "queue not provisioned; passive declare reported 404");
                self.reopen().await?;
                Ok(PassiveDeclare::NotFound)
            }
            Err(error) => Err(BrokerError::DeclareFailed {
                queue_name: queue.to_string(),
                message: error.to_string(),
            }),
        }
    }

    async fn declare_active(
        &self,
        queue: &QueueName,
        durable: bool,
    ) -> Result<QueueInfo, BrokerError> {
        let channel = self.channel.lock().await;
        let declared = channel
            .queue_declare(
                queue.as_str(),
                QueueDeclareOptions {
                    durable,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|error| BrokerError::DeclareFailed {
                queue_name: queue.to_string(),
                message: error.to_string(),
            })?;

        Ok(QueueInfo {
            ready_count: declared.message_count(),
            consumer_count: declared.consumer_count(),
        })
    }

    async fn publish(
        &self,
        queue: &QueueName,
        properties: MessageProperties,
        body: Bytes,
        mandatory: bool,
    ) -> Result<(), BrokerError> {
        let mut headers = FieldTable::default();
        for (key, value) in properties.headers {
            headers.insert(ShortString::from(key), AMQPValue::LongString(value.into()));
        }

        let basic_properties = BasicProperties::default()
            .with_content_type(ShortString::from(properties.content_type))
            .with_delivery_mode(properties.delivery_mode.as_wire_value())
            .with_message_id(ShortString::from(properties.message_id))
            .with_app_id(ShortString::from(properties.app_id))
            .with_timestamp(properties.timestamp)
            .with_headers(headers);

        let channel = self.channel.lock().await;
        let confirm = channel
            .basic_publish(
                "",
                queue.as_str(),
                BasicPublishOptions {
                    mandatory,
                    ..Default::default()
                },
                &body,
                basic_properties,
            )
            .await
            .map_err(|error| BrokerError::PublishRejected {
                queue_name: queue.to_string(),
                message: error.to_string(),
            })?;

        confirm
            .await
            .map_err(|error| BrokerError::PublishRejected {
                queue_name: queue.to_string(),
                message: error.to_string(),
            })?;

        Ok(())
    }

    async fn fetch_one(&self, queue: &QueueName) -> Result<Option<Delivery>, BrokerError> {
        let channel = self.channel.lock().await;
        let fetched = channel
            .basic_get(queue.as_str(), BasicGetOptions { no_ack: false })
            .await
            .map_err(|error| BrokerError::FetchFailed {
                queue_name: queue.to_string(),
                message: error.to_string(),
            })?;

        Ok(fetched.map(|message| Delivery {
            delivery_tag: message.delivery.delivery_tag,
            body: Bytes::from(message.delivery.data),
        }))
    }

    async fn nack_requeue(&self, delivery_tag: u64) -> Result<(), BrokerError> {
        let channel = self.channel.lock().await;
        channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    multiple: false,
                    requeue: true,
                },
            )
            .await
            .map_err(|error| BrokerError::NackFailed {
                delivery_tag,
                message: error.to_string(),
            })
    }

    async fn close(&self) -> Result<(), BrokerError> {
        let channel = self.channel.lock().await;
        channel
            .close(REPLY_SUCCESS, "closing")
            .await
            .map_err(|error| BrokerError::ChannelFailed {
                message: error.to_string(),
            })
    }
}
