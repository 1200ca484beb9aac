use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::Message,
    util::Timeout,
    Offset,
};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::domain::{NewOrder, Order};
use crate::pipeline::OrderPipeline;

// ============================================================================
// Received Orders Consumer
// ============================================================================
//
// Drains the received-orders topic and funnels every payload through the
// same ingestion path the HTTP endpoint uses. Offsets are committed only
// after ingestion succeeds. A failed message is not skipped: the partition
// is seeked back to its offset so the next fetch returns it again, and the
// duplicate check absorbs whatever a half-finished earlier attempt left
// behind.
//
// ============================================================================

/// Pause before re-fetching a failed message, so a poison message cannot
/// spin the loop at full speed.
const REDELIVERY_DELAY: Duration = Duration::from_secs(1);

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(config: &AppConfig, pipeline: Arc<OrderPipeline>) -> Result<()> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &config.kafka_brokers)
        .set("group.id", &config.consumer_group)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .set("session.timeout.ms", "6000")
        .set("enable.partition.eof", "false")
        .create()
        .context("Failed to create kafka consumer")?;

    consumer
        .subscribe(&[config.received_topic.as_str()])
        .context("Failed to subscribe to received orders topic")?;

    info!(
        topic = %config.received_topic,
        group = %config.consumer_group,
        "Listening for received orders"
    );

    let mut stream = consumer.stream();

    while let Some(next) = stream.next().await {
        match next {
            Ok(message) => {
                info!(
                    topic = message.topic(),
                    partition = message.partition(),
                    offset = message.offset(),
                    "Received order message"
                );

                let payload = message.payload().unwrap_or_default();
                let outcome = ingest_payload(&pipeline, payload).await;

                match &outcome {
                    Ok(order) => info!(
                        external_id = %order.external_id,
                        order_id = order.id,
                        "Order message processed"
                    ),
                    Err(err) => error!(
                        topic = message.topic(),
                        partition = message.partition(),
                        offset = message.offset(),
                        "Order message failed, rewinding for redelivery: {err:#}"
                    ),
                }

                match next_fetch(&outcome) {
                    NextFetch::Advance => {
                        if let Err(err) = consumer.commit_message(&message, CommitMode::Async) {
                            warn!(
                                offset = message.offset(),
                                error = %err,
                                "Failed to commit offset, message may be redelivered"
                            );
                        }
                    }
                    NextFetch::Redeliver => {
                        sleep(REDELIVERY_DELAY).await;
                        // A seek that fails would leave the stream past the
                        // message, so bail out and let the group protocol
                        // resume from the last committed offset instead.
                        consumer
                            .seek(
                                message.topic(),
                                message.partition(),
                                Offset::Offset(message.offset()),
                                Timeout::After(SEEK_TIMEOUT),
                            )
                            .context("Failed to rewind consumer to failed message")?;
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "Kafka receive error");
            }
        }
    }

    Ok(())
}

/// Where the consumer's read position goes after one handled message.
///
/// Skipping the commit is not enough for redelivery: the stream has already
/// advanced past the message, and the next successful commit on the same
/// partition would acknowledge the failed offset along with it. Redelivery
/// means seeking the partition back to the failed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NextFetch {
    /// Record the message as consumed and move on.
    Advance,
    /// Re-fetch the same offset so the message comes around again.
    Redeliver,
}

pub(crate) fn next_fetch(outcome: &Result<Order>) -> NextFetch {
    match outcome {
        Ok(_) => NextFetch::Advance,
        Err(_) => NextFetch::Redeliver,
    }
}

/// Decode one message payload and run it through the pipeline. Split out of
/// the consume loop so tests can drive it without a broker.
pub(crate) async fn ingest_payload(
    pipeline: &OrderPipeline,
    payload: &[u8],
) -> Result<Order> {
    let incoming: NewOrder =
        serde_json::from_slice(payload).context("Undecodable order payload")?;

    info!(external_id = %incoming.external_id, "Ingesting order from queue");

    let order = pipeline.ingest(incoming).await?;
    Ok(order)
}

// ============================================================================
// Unit Tests
// ============================================================================
