use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{LineItem, NewOrder, OrderStatus, ValidationError};
use crate::error::IngestError;
use crate::pipeline::OrderPipeline;

// ============================================================================
// HTTP API
// ============================================================================
//
// The synchronous entry point. Validation happens here, at the boundary;
// the queue consumer feeds the same pipeline without it, trusting its
// upstream producer. Errors map onto status codes per variant, with a
// uniform JSON error body.
//
// ============================================================================

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/orders")
            .route("", web::post().to(create_order))
            .route("/external/{external_id}", web::get().to(get_order_by_external_id))
            .route("/{id}", web::get().to(get_order)),
    )
    .route("/health", web::get().to(health))
    .route("/health/storage", web::get().to(storage_health));
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Ingest(IngestError::InvalidOrder { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Ingest(IngestError::DuplicateOrder(_)) => StatusCode::CONFLICT,
            ApiError::Ingest(IngestError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Ingest(IngestError::Persistence { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Ingest(IngestError::PublishFailed { .. }) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        HttpResponse::build(status).json(serde_json::json!({
            "timestamp": Utc::now(),
            "status": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": self.to_string(),
        }))
    }
}

#[derive(Serialize)]
struct CreateOrderResponse {
    success: bool,
    message: String,
    order_id: i64,
    external_id: String,
    status: OrderStatus,
    total: Decimal,
    created_at: DateTime<Utc>,
    line_items: Vec<LineItemSummary>,
}

#[derive(Serialize)]
struct LineItemSummary {
    id: i64,
    name: String,
    price: Decimal,
}

impl From<LineItem> for LineItemSummary {
    fn from(item: LineItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            price: item.price,
        }
    }
}

async fn create_order(
    pipeline: web::Data<OrderPipeline>,
    body: web::Json<NewOrder>,
) -> Result<HttpResponse, ApiError> {
    let incoming = body.into_inner();

    tracing::info!(external_id = %incoming.external_id, "Order creation request");
    incoming.validate()?;

    let order = pipeline.ingest(incoming).await?;
    let line_items = pipeline.line_items_for_order(order.id).await?;

    Ok(HttpResponse::Created().json(CreateOrderResponse {
        success: true,
        message: "order processed".to_string(),
        order_id: order.id,
        external_id: order.external_id,
        status: order.status,
        total: order.total,
        created_at: order.created_at,
        line_items: line_items.into_iter().map(Into::into).collect(),
    }))
}

async fn get_order(
    pipeline: web::Data<OrderPipeline>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let order = pipeline.find_by_id(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

async fn get_order_by_external_id(
    pipeline: web::Data<OrderPipeline>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let order = pipeline.find_by_external_id(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "order-ingest"
    }))
}

async fn storage_health(
    pipeline: web::Data<OrderPipeline>,
) -> Result<HttpResponse, ApiError> {
    let orders = pipeline.order_count().await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "orders": orders,
    })))
}

// ============================================================================
// Handler Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Order;
    use crate::messaging::{OrderEventPublisher, PublishError};
    use crate::store::{InMemoryLineItemStore, InMemoryOrderStore};
    use actix_web::{test, App};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NoopPublisher;

    #[async_trait]
    impl OrderEventPublisher for NoopPublisher {
        async fn publish_processed(&self, _order: &Order) -> Result<(), PublishError> {
            Ok(())
        }
    }

    struct FailingPublisher;

    #[async_trait]
    impl OrderEventPublisher for FailingPublisher {
        async fn publish_processed(&self, _order: &Order) -> Result<(), PublishError> {
            Err(PublishError::Exhausted {
                topic: "orders.processed".to_string(),
                attempts: 3,
                reason: "broker unavailable".to_string(),
            })
        }
    }

    fn pipeline_data(publisher: Arc<dyn OrderEventPublisher>) -> web::Data<OrderPipeline> {
        web::Data::new(OrderPipeline::new(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryLineItemStore::new()),
            publisher,
        ))
    }

    fn order_json(external_id: &str) -> serde_json::Value {
        serde_json::json!({
            "external_id": external_id,
            "line_items": [
                {"name": "Widget", "price": "10.50"},
                {"name": "Gadget", "price": "20.00"}
            ]
        })
    }

    #[actix_web::test]
    async fn test_create_order_returns_created() {
        let app = test::init_service(
            App::new()
                .app_data(pipeline_data(Arc::new(NoopPublisher)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/orders")
            .set_json(order_json("EXT-001"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["external_id"], "EXT-001");
        assert_eq!(body["status"], "PROCESSED");
        assert_eq!(body["total"], "30.50");
        assert_eq!(body["line_items"].as_array().unwrap().len(), 2);
        assert_eq!(body["line_items"][0]["name"], "Widget");
        assert_eq!(body["line_items"][1]["name"], "Gadget");
    }

    #[actix_web::test]
    async fn test_duplicate_order_returns_conflict() {
        let app = test::init_service(
            App::new()
                .app_data(pipeline_data(Arc::new(NoopPublisher)))
                .configure(configure),
        )
        .await;

        let first = test::TestRequest::post()
            .uri("/api/orders")
            .set_json(order_json("EXT-001"))
            .to_request();
        assert_eq!(
            test::call_service(&app, first).await.status(),
            StatusCode::CREATED
        );

        let second = test::TestRequest::post()
            .uri("/api/orders")
            .set_json(order_json("EXT-001"))
            .to_request();
        let resp = test::call_service(&app, second).await;

        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], 409);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("already exists"));
    }

    #[actix_web::test]
    async fn test_invalid_order_returns_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(pipeline_data(Arc::new(NoopPublisher)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/orders")
            .set_json(serde_json::json!({
                "external_id": "   ",
                "line_items": []
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], 400);
        assert!(body["message"].as_str().unwrap().contains("blank"));
    }

    #[actix_web::test]
    async fn test_get_order_by_id() {
        let app = test::init_service(
            App::new()
                .app_data(pipeline_data(Arc::new(NoopPublisher)))
                .configure(configure),
        )
        .await;

        let create = test::TestRequest::post()
            .uri("/api/orders")
            .set_json(order_json("EXT-001"))
            .to_request();
        let created: serde_json::Value =
            test::read_body_json(test::call_service(&app, create).await).await;
        let order_id = created["order_id"].as_i64().unwrap();

        let req = test::TestRequest::get()
            .uri(&format!("/api/orders/{order_id}"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["external_id"], "EXT-001");
        assert_eq!(body["status"], "PROCESSED");
    }

    #[actix_web::test]
    async fn test_get_missing_order_returns_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(pipeline_data(Arc::new(NoopPublisher)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/orders/999")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], 404);
        assert!(body["message"].as_str().unwrap().contains("999"));
    }

    #[actix_web::test]
    async fn test_get_order_by_external_id() {
        let app = test::init_service(
            App::new()
                .app_data(pipeline_data(Arc::new(NoopPublisher)))
                .configure(configure),
        )
        .await;

        let create = test::TestRequest::post()
            .uri("/api/orders")
            .set_json(order_json("EXT-001"))
            .to_request();
        test::call_service(&app, create).await;

        let req = test::TestRequest::get()
            .uri("/api/orders/external/EXT-001")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let miss = test::TestRequest::get()
            .uri("/api/orders/external/EXT-MISSING")
            .to_request();
        let resp = test::call_service(&app, miss).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_publish_failure_maps_to_bad_gateway_but_stores() {
        let app = test::init_service(
            App::new()
                .app_data(pipeline_data(Arc::new(FailingPublisher)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/orders")
            .set_json(order_json("EXT-001"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        // The order still landed in storage before publication failed.
        let follow_up = test::TestRequest::get()
            .uri("/api/orders/external/EXT-001")
            .to_request();
        let resp = test::call_service(&app, follow_up).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_health_endpoints() {
        let app = test::init_service(
            App::new()
                .app_data(pipeline_data(Arc::new(NoopPublisher)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/health/storage").to_request();
        let body: serde_json::Value =
            test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["orders"], 0);

        let create = test::TestRequest::post()
            .uri("/api/orders")
            .set_json(order_json("EXT-001"))
            .to_request();
        test::call_service(&app, create).await;

        let req = test::TestRequest::get().uri("/health/storage").to_request();
        let body: serde_json::Value =
            test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["orders"], 1);
    }
}
