mod api;
mod error;
mod middleware;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::error::{ApiError, ApiResponse};
pub use self::state::*;
pub use self::types::{AverageEncoding, FaceImageDetail, StatusCountItem};

#[derive(OpenApi)]
#[openapi(
    paths(
        api::create_face_image,
        api::get_face_image,
        api::face_image_stats,
        api::average_encodings,
        api::health_check,
    ),
    components(schemas(
        types::UploadForm,
        types::FaceImageCreated,
        types::FaceImageDetail,
        types::StatusCountItem,
        types::AverageEncoding,
        crate::envelope::ErrorBody,
    ))
)]
pub struct ApiDoc;

/// 构建API服务器，`upload_limit` 为请求体大小上限（字节）
pub fn create_app(state: Arc<AppState>, upload_limit: usize) -> Router {
    let face_image = Router::new()
        .route("/face-image/", post(api::create_face_image))
        .route("/face-image/stats/", get(api::face_image_stats))
        .route("/face-image/avg-encodings/", get(api::average_encodings))
        .route("/face-image/{public_id}/", get(api::get_face_image))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ));

    Router::new()
        .route("/health-check/", get(api::health_check))
        .merge(face_image)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback(api::not_found)
        .method_not_allowed_fallback(api::method_not_allowed)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_limit))
        .layer(axum::middleware::from_fn(middleware::envelope_errors))
        .with_state(state)
}
