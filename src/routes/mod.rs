use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::state::Services;

pub mod queue;
pub mod root;
pub mod sign;

pub fn create_router(services: Services) -> Router {
    Router::new()
        .merge(root::create_route())
        .merge(queue::create_route(services.clone()))
        .merge(sign::create_route(services))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
