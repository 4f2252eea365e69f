use std::net::IpAddr;
use std::net::SocketAddr;
use std::sync::Arc;

use auth::JwtError;
use axum::extract::ConnectInfo;
use axum::extract::Request;
use axum::extract::State;
use axum::http::header;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;

use crate::domain::ratelimit::limiter::RateLimiter;
use crate::domain::user::models::User;
use crate::domain::user::models::Username;
use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::router::AppState;
use crate::user::errors::UserError;

/// Extension type carrying the user behind a verified bearer token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
}

/// Middleware that validates bearer tokens and adds the active user to request extensions
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token_from_header(&req)?;

    let subject = state.authenticator.validate_token(token).map_err(|e| {
        tracing::warn!("Token validation failed: {}", e);
        let message = match e {
            JwtError::TokenExpired => "Token has expired",
            _ => "Invalid token",
        };
        ApiError::Unauthorized(message.to_string()).into_response()
    })?;

    let user = load_active_user(&state, subject).await?;

    req.extensions_mut().insert(AuthenticatedUser { user });

    Ok(next.run(req).await)
}

async fn load_active_user(state: &AppState, subject: String) -> Result<User, Response> {
    let invalid = || ApiError::Unauthorized("Invalid token".to_string()).into_response();

    let username = Username::new(subject).map_err(|_| invalid())?;
    match state.user_service.get_user_by_username(&username).await {
        Ok(user) if user.is_active => Ok(user),
        Ok(user) => {
            tracing::warn!(user_id = %user.id, "Token presented for inactive user");
            Err(invalid())
        }
        Err(UserError::NotFoundByUsername(_)) => {
            tracing::warn!(username = %username, "Token subject does not exist");
            Err(invalid())
        }
        Err(e) => Err(ApiError::from(e).into_response()),
    }
}

fn extract_token_from_header(req: &Request) -> Result<&str, Response> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| {
            ApiError::Unauthorized("Missing Authorization header".to_string()).into_response()
        })?;

    let auth_str = auth_header.to_str().map_err(|_| {
        ApiError::Unauthorized("Invalid Authorization header".to_string()).into_response()
    })?;

    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            ApiError::Unauthorized(
                "Invalid Authorization header format. Expected: Bearer <token>".to_string(),
            )
            .into_response()
        })
}

/// State of the rate-limit middleware.
#[derive(Clone)]
pub struct RateLimitGate {
    pub limiter: Arc<RateLimiter>,
    /// Peers whose `X-Forwarded-For` header is believed
    pub trusted_proxies: Arc<[IpAddr]>,
}

impl RateLimitGate {
    pub fn new(limiter: Arc<RateLimiter>, trusted_proxies: Arc<[IpAddr]>) -> Self {
        Self {
            limiter,
            trusted_proxies,
        }
    }
}

/// Middleware that counts the request against a rate limiter and short-circuits with 429
pub async fn rate_limit(
    State(gate): State<RateLimitGate>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let client = client_key(&req, &gate.trusted_proxies);

    if let Err(exceeded) = gate.limiter.check(&client).await {
        tracing::info!(
            scope = gate.limiter.scope(),
            client = %client,
            limit = %exceeded.limit,
            "Request throttled"
        );
        let mut response =
            ApiError::TooManyRequests("Too many requests".to_string()).into_response();
        if let Ok(value) = HeaderValue::from_str(&exceeded.retry_after.as_secs().max(1).to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return Err(response);
    }

    Ok(next.run(req).await)
}

/// Address the request is counted against.
///
/// The peer address, unless the peer is a trusted proxy: then the
/// `X-Forwarded-For` chain is walked from the right and the first hop that is
/// not itself a trusted proxy is used. Unparseable hops end the walk.
pub fn client_key(req: &Request, trusted_proxies: &[IpAddr]) -> String {
    let Some(ConnectInfo(peer)) = req.extensions().get::<ConnectInfo<SocketAddr>>() else {
        return "unknown".to_string();
    };

    let mut client = peer.ip();
    if !trusted_proxies.contains(&client) {
        return client.to_string();
    }

    let hops: Vec<&str> = req
        .headers()
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .collect();

    for hop in hops.iter().rev() {
        let Ok(address) = hop.parse::<IpAddr>() else {
            break;
        };
        client = address;
        if !trusted_proxies.contains(&address) {
            break;
        }
    }

    client.to_string()
}
