use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{CallerId, EventScope};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

/// GET /events/:event_id/stats
pub async fn event_stats(
    State(state): State<AppState>,
    caller: CallerId,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    state
        .admission
        .authorize(caller, EventScope::Event(event_id))
        .await?;
    let stats = state.reporting.stats(event_id).await?;
    Ok(success(stats, "Statistics retrieved").into_response())
}

#[derive(Deserialize, Default)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// GET /events/:event_id/check-ins?limit=
pub async fn check_in_history(
    State(state): State<AppState>,
    caller: CallerId,
    Path(event_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, AppError> {
    state
        .admission
        .authorize(caller, EventScope::Event(event_id))
        .await?;
    let history = state.reporting.check_in_history(event_id, query.limit).await?;
    Ok(success(history, "Check-in history retrieved").into_response())
}
