//! RabbitMQ plumbing.
//!
//! One durable queue carries the typed event envelopes from the webhook server
//! to the consumer. Publishing marks messages persistent; consumption acks per
//! message so a failed handler run is redelivered (at-least-once).

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use thiserror::Error;
use tracing::info;

use crate::events::{EnvelopeError, GithubEvent};

/// AMQP delivery mode for persistent messages.
const PERSISTENT: u8 = 2;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue connection failed: {0}")]
    Amqp(#[from] lapin::Error),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

/// Where classified events are sent. The webhook server only knows this trait.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: GithubEvent) -> Result<(), QueueError>;
}

/// A declared RabbitMQ queue, usable for both publishing and consuming.
pub struct EventQueue {
    // Held so the broker connection outlives the channel.
    _connection: Connection,
    channel: Channel,
    queue_name: String,
}

impl EventQueue {
    /// Connects to the broker and declares the durable queue.
    pub async fn connect(url: &str, queue_name: &str) -> Result<EventQueue, QueueError> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        info!(queue = queue_name, "declared event queue");

        Ok(EventQueue {
            _connection: connection,
            channel,
            queue_name: queue_name.to_string(),
        })
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

#[async_trait]
impl EventSink for EventQueue {
    async fn publish(&self, event: GithubEvent) -> Result<(), QueueError> {
        let payload = event.encode()?;

        self.channel
            .basic_publish(
                "",
                &self.queue_name,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(PERSISTENT),
            )
            .await?
            .await?;

        Ok(())
    }
}
