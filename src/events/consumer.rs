//! Queue consumer.
//!
//! Drains the event queue with a bounded number of concurrent handlers.
//! Handler failure nacks the delivery with requeue, so processing is
//! at-least-once; undecodable messages are acked away rather than poisoning
//! the queue. Shutdown is cooperative: the loop stops taking deliveries and
//! waits for in-flight handlers.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions};
use lapin::types::FieldTable;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::engine::EngineError;
use crate::events::GithubEvent;
use crate::queue::{EventQueue, QueueError};

/// Handles one dequeued event. Implemented by the lifecycle engine.
#[async_trait]
pub trait EventProcessor: Send + Sync + 'static {
    async fn process(&self, event: GithubEvent) -> Result<(), EngineError>;
}

/// Runs the consume loop until the token is cancelled or the stream ends.
pub async fn run(
    queue: &EventQueue,
    processor: Arc<dyn EventProcessor>,
    workers: usize,
    shutdown: CancellationToken,
) -> Result<(), QueueError> {
    queue
        .channel()
        .basic_qos(workers as u16, BasicQosOptions::default())
        .await?;

    let mut consumer = queue
        .channel()
        .basic_consume(
            queue.queue_name(),
            "merge-fee-bot",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!(workers, "consuming events");

    let semaphore = Arc::new(Semaphore::new(workers));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown requested, draining in-flight handlers");
                break;
            }
            delivery = consumer.next() => {
                let Some(delivery) = delivery else {
                    warn!("event stream ended");
                    break;
                };

                let delivery = match delivery {
                    Ok(delivery) => delivery,
                    Err(e) => {
                        warn!(error = %e, "failed to receive delivery");
                        continue;
                    }
                };

                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };

                let processor = processor.clone();
                tokio::spawn(async move {
                    handle_delivery(processor, delivery).await;
                    drop(permit);
                });
            }
        }
    }

    // All permits back means all spawned handlers have finished.
    let _drain = semaphore.acquire_many(workers as u32).await;

    Ok(())
}

async fn handle_delivery(processor: Arc<dyn EventProcessor>, delivery: lapin::message::Delivery) {
    let event = match GithubEvent::decode(&delivery.data) {
        Ok(event) => event,
        Err(e) => {
            // A message that cannot decode will never decode; drop it.
            warn!(error = %e, "discarding undecodable message");
            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                error!(error = %e, "failed to ack undecodable message");
            }
            return;
        }
    };

    let pr = event.pr_number();

    match processor.process(event).await {
        Ok(()) => {
            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                error!(pr = %pr, error = %e, "failed to ack message");
            }
        }
        Err(e) => {
            error!(pr = %pr, error = %e, "event handling failed, requeueing");
            if let Err(e) = delivery
                .nack(BasicNackOptions {
                    requeue: true,
                    ..Default::default()
                })
                .await
            {
                error!(pr = %pr, error = %e, "failed to nack message");
            }
        }
    }
}
