use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;

use super::ApiError;
use crate::inbound::http::middleware::AuthenticatedUser;
use crate::inbound::http::router::AppState;

/// Deactivate the calling account. The record is kept.
pub async fn deactivate_user(
    State(state): State<AppState>,
    Extension(authenticated): Extension<AuthenticatedUser>,
) -> Result<StatusCode, ApiError> {
    state
        .user_service
        .deactivate_user(&authenticated.user.id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
