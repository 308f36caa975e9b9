use std::collections::HashSet;
use std::sync::Arc;
use axum::{
    Router,
    routing::{get, post},
    extract::{Path, State, Json},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tower_http::trace::TraceLayer;
use crate::error::Error;
use crate::interfaces::booking_store::BookingStore;
use crate::observability::metrics::gather_text;
use crate::settlement::reconciliation::ReconciliationEngine;
use crate::settlement::refund_policy::AdjustedBreakdown;
use crate::settlement::report::ReconciliationResult;
use crate::types::ids::BookingId;

pub struct ApiState {
    pub engine: Arc<ReconciliationEngine>,
    pub store: Arc<dyn BookingStore>,
}

pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/reconcile", post(reconcile))
        .route("/bookings/:id/breakdown", get(preview_breakdown))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[derive(serde::Deserialize, Default)]
struct ReconcileRequest {
    #[serde(default)]
    booking_ids: Option<Vec<BookingId>>,
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}

async fn reconcile(
    State(state): State<Arc<ApiState>>,
    body: Option<Json<ReconcileRequest>>,
) -> Result<Json<ReconciliationResult>, Response> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let ids: Option<HashSet<BookingId>> = req.booking_ids.map(|ids| ids.into_iter().collect());

    let result = state.engine.reconcile(ids.as_ref()).await.map_err(|e| {
        tracing::error!("Reconciliation request failed: {}", e);
        error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })?;

    tracing::info!("Reconciliation request finished: {}", result.summary());
    Ok(Json(result))
}

/// Recompute one booking's fees without writing them back.
async fn preview_breakdown(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<AdjustedBreakdown>, Response> {
    let booking_id = BookingId::from_string(&id)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, format!("invalid booking id: {}", id)))?;

    let ids: HashSet<BookingId> = [booking_id].into_iter().collect();
    let booking = state.store.list_candidates(Some(&ids)).await
        .map_err(|e| error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?
        .into_iter()
        .next()
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, Error::BookingNotFound(booking_id).to_string()))?;

    let adjusted = state.engine.recompute(&booking).await.map_err(|e| {
        let status = match &e {
            Error::MissingPaymentReference(_) => StatusCode::UNPROCESSABLE_ENTITY,
            e if e.is_transient() => StatusCode::BAD_GATEWAY,
            Error::LedgerFetch { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        error_response(status, e.to_string())
    })?;

    Ok(Json(adjusted))
}

async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_text(),
    )
}
