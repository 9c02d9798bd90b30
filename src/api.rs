//! HTTP surfaces: the messenger's publish endpoint and the subscriber's
//! snapshot endpoint for external dashboards to poll.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::error;

use crate::aggregator::{Aggregator, Snapshot};
use crate::transport::Publisher;
use crate::{MESSAGES_TOPIC, MessageEnvelope};

/// State for the messenger router
#[derive(Clone)]
pub struct MessengerState {
    pub publisher: Publisher,
    pub messenger_id: String,
}

/// Body of a message submission
#[derive(Debug, Deserialize)]
pub struct UserInput {
    /// Message to be sent
    pub message: String,
}

/// Router for `vigia-messenger`: accepts user messages and publishes them.
pub fn messenger_router(state: MessengerState) -> Router {
    Router::new()
        .route("/", post(publish_message))
        .route("/health", get(health))
        .with_state(state)
}

/// Publish a user message to the broker.
///
/// Publish failures are logged, never surfaced to the submitter; the
/// message is fire-and-forget from the HTTP client's point of view.
async fn publish_message(
    State(state): State<MessengerState>,
    Json(input): Json<UserInput>,
) -> StatusCode {
    let envelope = MessageEnvelope::now(&state.messenger_id, input.message);

    if let Err(e) = state.publisher.publish_json(MESSAGES_TOPIC, &envelope).await {
        error!("failed to publish message data: {e:#}");
    }

    StatusCode::OK
}

/// Router for the subscriber's snapshot API.
pub fn snapshot_router(aggregator: Arc<Aggregator>) -> Router {
    Router::new()
        .route("/snapshot", get(get_snapshot))
        .route("/health", get(health))
        .with_state(aggregator)
}

async fn get_snapshot(State(aggregator): State<Arc<Aggregator>>) -> Json<Snapshot> {
    Json(aggregator.snapshot())
}

async fn health() -> StatusCode {
    StatusCode::OK
}
