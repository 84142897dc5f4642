//! Scrape endpoint

use axum::{extract::State, http::header, response::IntoResponse};
use tracing::error;

use crate::collector::{
    error::{CollectorError, CollectorResult},
    state::CollectorState,
};

/// GET /metrics
///
/// Current counter and summary in the Prometheus text format. No side effects.
pub async fn scrape(
    State(state): State<CollectorState>,
) -> CollectorResult<impl IntoResponse> {
    let body = state.aggregator.render().map_err(|e| {
        error!("unable to encode metrics: {e}");
        CollectorError::Internal(format!("unable to encode metrics: {e}"))
    })?;

    Ok(([(header::CONTENT_TYPE, state.aggregator.content_type())], body))
}
