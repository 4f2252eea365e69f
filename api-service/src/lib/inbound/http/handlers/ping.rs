use axum::extract::State;
use axum::http::StatusCode;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::inbound::http::router::AppState;

pub async fn ping(State(state): State<AppState>) -> Result<ApiSuccess<PingResponseData>, ApiError> {
    Ok(ApiSuccess::new(
        StatusCode::OK,
        PingResponseData {
            status: "ok".to_string(),
            rate_limit_backend: state.rate_limit_backend.to_string(),
            timestamp: Utc::now(),
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PingResponseData {
    pub status: String,
    pub rate_limit_backend: String,
    pub timestamp: DateTime<Utc>,
}
