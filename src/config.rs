use std::env;

// ============================================================================
// Service Configuration
// ============================================================================
//
// Every knob comes from the environment with a local-dev default, so the
// service runs against a localhost broker out of the box. DATABASE_URL is
// the one optional setting: when it is absent storage stays in memory.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string; storage falls back to memory when unset
    pub database_url: Option<String>,
    pub kafka_brokers: String,
    pub http_addr: String,
    pub received_topic: String,
    pub processed_topic: String,
    pub consumer_group: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").ok(),
            kafka_brokers: env_or("KAFKA_BROKERS", "127.0.0.1:9092"),
            http_addr: env_or("HTTP_ADDR", "0.0.0.0:8080"),
            received_topic: env_or("ORDERS_RECEIVED_TOPIC", "orders.received"),
            processed_topic: env_or("ORDERS_PROCESSED_TOPIC", "orders.processed"),
            consumer_group: env_or("CONSUMER_GROUP", "order-ingest-group"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
