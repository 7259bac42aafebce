use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow};
use cdr_bulk::{Action, ActionResult, BulkSink, Chunk};
use cdr_schema::ID_FIELD;
use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, info};
use rdkafka::{
    ClientConfig, ClientContext,
    error::{KafkaError, RDKafkaErrorCode},
    producer::{BaseProducer, BaseRecord, DeliveryResult, Producer, ProducerContext},
};
use serde_json::{Map, Value};

/// Result kind of a delivered message.
const DELIVERED: &str = "created";
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub topic: String,
    /// Comma-separated `host:port` list.
    pub brokers: Option<String>,
    /// Directory holding `ca-cert.pem`, `client-cert.pem` and `client-key.pem`.
    pub ssl_keys_path: Option<PathBuf>,
    pub flush_timeout: Duration,
}

impl KafkaConfig {
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("message.max.bytes", (10 * (1 << 20)).to_string())
            .set("request.timeout.ms", "120000")
            .set("message.send.max.retries", "5")
            .set("retry.backoff.ms", "30000")
            .set("compression.type", "gzip");

        if let Some(brokers) = &self.brokers {
            config.set("bootstrap.servers", brokers);
        }

        if let Some(keys) = &self.ssl_keys_path {
            let path = |name: &str| keys.join(name).to_string_lossy().into_owned();
            config
                .set("security.protocol", "ssl")
                .set("ssl.endpoint.identification.algorithm", "none")
                .set("ssl.ca.location", path("ca-cert.pem"))
                .set("ssl.certificate.location", path("client-cert.pem"))
                .set("ssl.key.location", path("client-key.pem"));
        }

        config
    }
}

/// Message value: the payload with `_id` restored as its first field.
pub(crate) fn message_value(action: &Action) -> Map<String, Value> {
    let payload = action.payload();
    let mut value = Map::with_capacity(payload.map_or(0, Map::len) + 1);
    value.insert(ID_FIELD.to_string(), Value::from(action.id()));
    if let Some(payload) = payload {
        for (k, v) in payload {
            value.insert(k.clone(), v.clone());
        }
    }
    value
}

type DeliveryReport = (usize, Result<(), String>);

/// Fill `outcomes` from `reports` until every slot is set, every sender is
/// gone, or `deadline` passes.
///
/// Producer threads share one delivery queue, so another thread's flush may
/// run the callback for a message of this chunk after our own flush returned.
pub(crate) fn await_reports(
    reports: &Receiver<DeliveryReport>,
    outcomes: &mut [Option<Result<(), String>>],
    deadline: Instant,
) {
    while outcomes.iter().any(Option::is_none) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match reports.recv_timeout(remaining) {
            Ok((index, outcome)) => outcomes[index] = Some(outcome),
            Err(_) => break,
        }
    }
}

/// Routes a delivery report back to the chunk that produced the message.
pub struct Delivery {
    index: usize,
    report: Sender<DeliveryReport>,
}

pub struct DeliveryContext;

impl ClientContext for DeliveryContext {}

impl ProducerContext for DeliveryContext {
    type DeliveryOpaque = Box<Delivery>;

    fn delivery(&self, result: &DeliveryResult<'_>, delivery: Self::DeliveryOpaque) {
        let outcome = match result {
            Ok(_) => Ok(()),
            Err((e, _)) => Err(e.to_string()),
        };
        // The chunk may already have given up waiting.
        let _ = delivery.report.send((delivery.index, outcome));
    }
}

/// Publishes each action as one message keyed by its id. A chunk is flushed
/// before its results are returned.
pub struct KafkaSink {
    producer: BaseProducer<DeliveryContext>,
    config: KafkaConfig,
}

impl KafkaSink {
    pub fn new(config: KafkaConfig) -> Result<Self> {
        let producer = config
            .client_config()
            .create_with_context(DeliveryContext)
            .context("failed to create Kafka producer")?;
        info!("[kafka] producing to topic {}", config.topic);
        Ok(Self { producer, config })
    }

    fn enqueue(&self, index: usize, action: &Action, report: &Sender<DeliveryReport>) -> Result<()> {
        let value = serde_json::to_vec(&message_value(action))?;
        let mut record = BaseRecord::with_opaque_to(
            &self.config.topic,
            Box::new(Delivery {
                index,
                report: report.clone(),
            }),
        )
        .key(action.id())
        .payload(&value);

        loop {
            match self.producer.send(record) {
                Ok(()) => return Ok(()),
                Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), rejected)) => {
                    self.producer.poll(QUEUE_FULL_BACKOFF);
                    record = rejected;
                }
                Err((e, _)) => return Err(anyhow!("failed to enqueue {}: {e}", action.id())),
            }
        }
    }
}

impl BulkSink for KafkaSink {
    fn submit(&self, chunk: &Chunk) -> Result<Vec<ActionResult>> {
        let (report_tx, report_rx) = channel::unbounded();
        let mut outcomes: Vec<Option<Result<(), String>>> = vec![None; chunk.len()];

        for (index, action) in chunk.actions().iter().enumerate() {
            if let Err(e) = self.enqueue(index, action, &report_tx) {
                outcomes[index] = Some(Err(format!("{e:#}")));
            }
        }
        drop(report_tx);

        let deadline = Instant::now() + self.config.flush_timeout;
        self.producer
            .flush(self.config.flush_timeout)
            .context("Kafka flush failed")?;
        await_reports(&report_rx, &mut outcomes, deadline);
        debug!("[kafka] flushed {} messages", chunk.len());

        let results = chunk
            .actions()
            .iter()
            .zip(outcomes)
            .map(|(action, outcome)| match outcome {
                Some(Ok(())) => ActionResult::ok(action.operation(), DELIVERED),
                Some(Err(e)) => ActionResult::failed(action.operation(), "kafka_error", e),
                None => ActionResult::failed(
                    action.operation(),
                    "kafka_error",
                    "no delivery report before flush timeout",
                ),
            })
            .collect();

        Ok(results)
    }
}

#[cfg(test)]
#[path = "kafka_tests.rs"]
mod tests;
