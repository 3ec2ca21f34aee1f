mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::analyze_handler,
        api::status_handler,
        api::download_handler,
        api::browse_handler,
        api::recent_handler,
        api::metrics_handler,
    ),
    components(schemas(
        types::AnalyzeRequest,
        types::AnalyzeResponse,
        types::BrowseResponse,
        types::BrowseItem,
        crate::job::JobSnapshot,
        crate::job::JobStatus,
        crate::types::MatchMode,
    ))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/analyze", post(api::analyze_handler))
        .route("/status/{job_id}", get(api::status_handler))
        .route("/download/{job_id}/{file_type}", get(api::download_handler))
        .route("/browse", get(api::browse_handler))
        .route("/recent", get(api::recent_handler))
        .route("/metrics", get(api::metrics_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // 请求只包含少量 JSON 参数
        .layer(RequestBodyLimitLayer::new(1024 * 64))
        .with_state(state)
}
