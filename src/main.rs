use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod domain;
mod error;
mod messaging;
mod pipeline;
mod store;
mod utils;

use config::AppConfig;
use messaging::{KafkaTransport, ProcessedOrderPublisher};
use pipeline::OrderPipeline;
use store::{LineItemStore, OrderStore};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_ingest=debug")),
        )
        .init();

    tracing::info!("🚀 Starting order ingestion service");

    let config = AppConfig::from_env();

    // === 1. Storage backend ===
    // Postgres when DATABASE_URL is set, otherwise an in-memory pair with
    // the same contract.
    let (orders, line_items): (Arc<dyn OrderStore>, Arc<dyn LineItemStore>) =
        match &config.database_url {
            Some(url) => {
                tracing::info!("Connecting to Postgres...");
                let pool = store::postgres::connect(url).await?;
                store::postgres::ensure_schema(&pool).await?;
                (
                    Arc::new(store::PgOrderStore::new(pool.clone())),
                    Arc::new(store::PgLineItemStore::new(pool)),
                )
            }
            None => {
                tracing::info!("DATABASE_URL not set, using in-memory storage");
                (
                    Arc::new(store::InMemoryOrderStore::new()),
                    Arc::new(store::InMemoryLineItemStore::new()),
                )
            }
        };

    // === 2. Kafka transport and processed-order publisher ===
    let transport = Arc::new(KafkaTransport::new(&config.kafka_brokers)?);
    let publisher = Arc::new(ProcessedOrderPublisher::new(
        transport,
        config.processed_topic.clone(),
    ));

    // === 3. Ingestion pipeline shared by both entry points ===
    let pipeline = Arc::new(OrderPipeline::new(orders, line_items, publisher));

    // === 4. Queue consumer in the background ===
    let consumer_config = config.clone();
    let consumer_pipeline = pipeline.clone();
    tokio::spawn(async move {
        if let Err(err) = messaging::consumer::run(&consumer_config, consumer_pipeline).await {
            tracing::error!("Order consumer terminated: {err:#}");
        }
    });

    // === 5. HTTP server in the foreground ===
    tracing::info!(addr = %config.http_addr, "HTTP server listening");
    let http_pipeline = pipeline.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::from(http_pipeline.clone()))
            .configure(api::configure)
    })
    .bind(config.http_addr.as_str())?
    .run()
    .await?;

    Ok(())
}
