pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::ServiceConfig;
use crate::services::derivative::DerivativeService;
use crate::services::storage::StorageService;
use crate::services::transformer::Transformer;
use axum::{Router, middleware::from_fn, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::derivatives::create_derivative,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::error::ErrorResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "derivatives", description = "Lower quality image derivatives"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageService>,
    pub transformer: Arc<dyn Transformer>,
    pub derivatives: Arc<DerivativeService>,
    pub config: ServiceConfig,
}

impl AppState {
    /// Wires the pipeline from the injected store and transformer.
    pub fn new(
        storage: Arc<dyn StorageService>,
        transformer: Arc<dyn Transformer>,
        config: ServiceConfig,
    ) -> Self {
        let derivatives = Arc::new(DerivativeService::new(
            storage.clone(),
            transformer.clone(),
            config.clone(),
        ));
        Self {
            storage,
            transformer,
            derivatives,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route(
            "/createNewLowerQualityImage",
            get(api::handlers::derivatives::create_derivative),
        )
        .route(
            "/derivatives",
            get(api::handlers::derivatives::create_derivative),
        )
        .route("/health", get(api::handlers::health::health_check))
        .route_layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(state)
}
