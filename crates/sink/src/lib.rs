mod client;
mod elastic;
#[cfg(feature = "kafka")]
mod kafka;
mod response;
mod scroll;

pub use client::{ElasticClient, ElasticConfig, parse_host};
pub use elastic::ElasticSink;
#[cfg(feature = "kafka")]
pub use kafka::{KafkaConfig, KafkaSink};
pub use response::parse_bulk_response;
pub use scroll::{ScrollHits, domain_query, hit_to_record};
