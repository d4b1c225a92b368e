//! Analytics handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};

use tally_core::{AnalyticsAggregator, AnalyticsSnapshot};

use crate::{current_user_id, AppError, AppState};

/// GET /api/transactions/analytics - Spending snapshot for the caller
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<AnalyticsSnapshot>, AppError> {
    let user = current_user_id(request.headers());

    let snapshot = AnalyticsAggregator::new(&state.db, state.clock.clone())
        .with_palette(state.palette.clone())
        .snapshot(&user)?;

    Ok(Json(snapshot))
}
