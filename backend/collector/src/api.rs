//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use card_registry::Address;
use serde::Serialize;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::db;
use crate::errors::{CollectorError, Result};
use crate::events::{CollectedEvent, EventRecord, NotificationEnvelope};

#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
}

/// Build the collector router: ingest, queries and health.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/notifications", post(ingest_notification))
        .route("/events", get(get_all_events))
        .route("/cards/:id/events", get(get_card_events))
        .route("/accounts/:address/events", get(get_account_events))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct CardEventsResponse {
    pub card_id: u64,
    pub count: usize,
    pub events: Vec<EventRecord>,
}

#[derive(Serialize)]
pub struct AccountEventsResponse {
    pub address: String,
    pub count: usize,
    pub events: Vec<EventRecord>,
}

#[derive(Serialize)]
pub struct AllEventsResponse {
    pub count: usize,
    pub events: Vec<EventRecord>,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub stored: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /notifications`
///
/// Stores one notification envelope. Redelivered envelopes are accepted but
/// reported with `stored: false`.
pub async fn ingest_notification(
    State(state): State<Arc<ApiState>>,
    Json(envelope): Json<NotificationEnvelope>,
) -> Response {
    let stored: Result<bool> = async {
        let event = CollectedEvent::from_envelope(&envelope)?;
        db::insert_event(&state.pool, &event).await
    }
    .await;

    match stored {
        Ok(stored) => (StatusCode::ACCEPTED, Json(IngestResponse { stored })).into_response(),
        Err(CollectorError::EventDecode(e)) => {
            warn!(source = %envelope.source, sequence = envelope.sequence, "rejected notification: {e}");
            error_response(StatusCode::UNPROCESSABLE_ENTITY, e)
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// `GET /events`
///
/// Returns all collected events across all sources.
pub async fn get_all_events(State(state): State<Arc<ApiState>>) -> Response {
    match db::get_all_events(&state.pool).await {
        Ok(events) => {
            let count = events.len();
            (StatusCode::OK, Json(AllEventsResponse { count, events })).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// `GET /cards/:id/events`
///
/// Returns the mint, upgrade and trade history of one card.
pub async fn get_card_events(
    State(state): State<Arc<ApiState>>,
    Path(card_id): Path<u64>,
) -> Response {
    let Ok(db_id) = i64::try_from(card_id) else {
        return error_response(StatusCode::BAD_REQUEST, "card id out of range");
    };
    match db::get_events_for_card(&state.pool, db_id).await {
        Ok(events) => {
            let count = events.len();
            (
                StatusCode::OK,
                Json(CardEventsResponse {
                    card_id,
                    count,
                    events,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// `GET /accounts/:address/events`
///
/// Returns every event in which the address acted or was the counterparty.
pub async fn get_account_events(
    State(state): State<Arc<ApiState>>,
    Path(address): Path<String>,
) -> Response {
    let address = match address.parse::<Address>() {
        Ok(parsed) => parsed.to_string(),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    match db::get_events_for_account(&state.pool, &address).await {
        Ok(events) => {
            let count = events.len();
            (
                StatusCode::OK,
                Json(AccountEventsResponse {
                    address,
                    count,
                    events,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}
