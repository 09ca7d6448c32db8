use axum::{extract::State, routing::get, Json, Router};

use crate::{models::QueueStatus, state::Services};

pub fn create_route(services: Services) -> Router {
    Router::new().route("/queue", get(queue_status)).with_state(services)
}

pub async fn queue_status(State(services): State<Services>) -> Json<QueueStatus> {
    Json(services.queue.status())
}
