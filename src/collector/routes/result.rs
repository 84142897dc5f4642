//! Result submission endpoint

use std::net::SocketAddr;

use axum::{
    body::{Body, to_bytes},
    extract::{ConnectInfo, State},
    http::{Method, StatusCode},
};
use tracing::{error, info, instrument, warn};

use crate::ProbeResult;
use crate::collector::{
    error::{CollectorError, CollectorResult},
    state::CollectorState,
};

/// POST /result
///
/// Accepts a single client result and folds it into the aggregates.
///
/// - non-POST method: 400
/// - body read failure: 500
/// - malformed or invalid result: 400
/// - otherwise: 202
#[instrument(skip_all, fields(remote_addr = %remote_addr))]
pub async fn submit_result(
    State(state): State<CollectorState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    method: Method,
    body: Body,
) -> CollectorResult<StatusCode> {
    if method != Method::POST {
        warn!(%method, "received non-POST request");
        return Err(CollectorError::BadRequest(format!(
            "method {method} not allowed, use POST"
        )));
    }

    let body = to_bytes(body, usize::MAX).await.map_err(|e| {
        error!("unexpected error while reading request body: {e}");
        CollectorError::Internal(format!("unable to read request body: {e}"))
    })?;

    let result = serde_json::from_slice::<ProbeResult>(&body).map_err(|e| {
        error!(
            body = %String::from_utf8_lossy(&body),
            "unexpected error while unmarshaling request body: {e}"
        );
        CollectorError::BadRequest(format!("invalid result: {e}"))
    })?;

    result.validate().map_err(|reason| {
        warn!(?result, "rejecting result: {reason}");
        CollectorError::BadRequest(reason)
    })?;

    state.aggregator.record(&result);
    info!(?result, "received result from client");

    Ok(StatusCode::ACCEPTED)
}
