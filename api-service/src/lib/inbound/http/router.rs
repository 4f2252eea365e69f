use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use auth::Authenticator;
use axum::body::Body;
use axum::http::header;
use axum::http::HeaderValue;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::handlers::change_password::change_password;
use super::handlers::current_user::current_user;
use super::handlers::deactivate_user::deactivate_user;
use super::handlers::login::login;
use super::handlers::ping::ping;
use super::handlers::register::register;
use super::middleware::authenticate as auth_middleware;
use super::middleware::rate_limit;
use super::middleware::RateLimitGate;
use crate::domain::ratelimit::limiter::RateLimiter;
use crate::domain::user::ports::UserServicePort;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<dyn UserServicePort>,
    pub authenticator: Arc<Authenticator>,
    /// Name of the counter store chosen at startup
    pub rate_limit_backend: Arc<str>,
}

/// Limiters applied by the router.
#[derive(Clone)]
pub struct RateLimiters {
    /// Applied to every route
    pub default: Arc<RateLimiter>,
    /// Applied additionally to token issuance
    pub login: Arc<RateLimiter>,
    /// Reverse proxies allowed to report the client address
    pub trusted_proxies: Vec<IpAddr>,
}

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
    script-src 'self' 'unsafe-inline' https://cdnjs.cloudflare.com; \
    style-src 'self' 'unsafe-inline' https://fonts.googleapis.com; \
    font-src 'self' https://fonts.gstatic.com; img-src 'self' data:; connect-src 'self'";

/// Headers set on every response, including rejections from middleware.
fn security_headers() -> [(header::HeaderName, HeaderValue); 5] {
    [
        (
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ),
        (
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
        (header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")),
        (
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ),
    ]
}

pub fn create_router(state: AppState, limiters: RateLimiters) -> Router {
    let trusted_proxies: Arc<[IpAddr]> = Arc::from(limiters.trusted_proxies);
    let default_gate = RateLimitGate::new(limiters.default, Arc::clone(&trusted_proxies));
    let login_gate = RateLimitGate::new(limiters.login, trusted_proxies);

    let public_routes = Router::new()
        .route("/api/ping", get(ping))
        .route("/api/register", post(register));

    let login_routes = Router::new()
        .route("/api/token", post(login))
        .route_layer(middleware::from_fn_with_state(login_gate, rate_limit));

    let protected_routes = Router::new()
        .route("/api/users/me", get(current_user).delete(deactivate_user))
        .route("/api/users/me/password", put(change_password))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                "Request started"
            );
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    let mut router = Router::new()
        .merge(public_routes)
        .merge(login_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(default_gate, rate_limit));

    for (name, value) in security_headers() {
        router = router.layer(SetResponseHeaderLayer::overriding(name, value));
    }

    router
        .layer(trace_layer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
