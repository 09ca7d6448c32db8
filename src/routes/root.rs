use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::consts::{NAME, VERSION};
use crate::models::{RootDto, RootLinks};

pub fn create_route() -> Router {
    Router::new().route("/", get(root_links)).route("/health", get(health))
}

pub async fn root_links() -> Json<RootDto<'static>> {
    Json(RootDto {
        version: VERSION,
        name: NAME,
        _links: RootLinks { sign: "/sign", queue: "/queue" },
    })
}

#[tracing::instrument]
pub async fn health() -> StatusCode {
    StatusCode::OK
}
