use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use api_service::config::Config;
use api_service::domain::audit::ports::AuditSink;
use api_service::domain::ratelimit::limiter::RateLimiter;
use api_service::domain::ratelimit::models::RateLimit;
use api_service::domain::registry::EntityRegistry;
use api_service::domain::user::ports::UserServicePort;
use api_service::domain::user::service::UserService;
use api_service::inbound::http::router::create_router;
use api_service::inbound::http::router::AppState;
use api_service::inbound::http::router::RateLimiters;
use api_service::outbound::audit::TracingAuditSink;
use api_service::outbound::ratelimit::BackendSelector;
use api_service::outbound::ratelimit::RedisConnector;
use api_service::outbound::repositories::schema::register_entities;
use api_service::outbound::repositories::InMemoryUserRepository;
use api_service::outbound::repositories::PostgresUserRepository;
use auth::Authenticator;
use auth::CredentialStore;
use auth::HashParams;
use auth::JwtHandler;
use auth::PasswordHasher;
use auth::PasswordPolicy;
use auth::TokenService;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_service=debug,auth=info,audit=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "api-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load().context("Failed to load configuration")?;

    tracing::info!(
        http_port = config.server.http_port,
        database = if config.database.url.is_some() { "postgresql" } else { "memory" },
        jwt_algorithm = %config.jwt.algorithm,
        jwt_expiration_minutes = config.jwt.expiration_minutes,
        "Configuration loaded"
    );

    let authenticator = Arc::new(build_authenticator(&config)?);
    let audit: Arc<TracingAuditSink> = Arc::new(TracingAuditSink::new());

    let user_service: Arc<dyn UserServicePort> = match &config.database.url {
        Some(url) => {
            let pg_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect(url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!(
                max_connections = config.database.max_connections,
                database = "postgresql",
                "Database connection pool created"
            );

            let registry = EntityRegistry::new();
            register_entities(&registry);

            let repository = PostgresUserRepository::new(pg_pool);
            repository.ensure_schema(&registry).await?;
            tracing::info!(entities = ?registry.names(), "Database schema ensured");

            Arc::new(UserService::new(
                Arc::new(repository),
                Arc::clone(&audit),
                Arc::clone(&authenticator),
            ))
        }
        None => {
            tracing::warn!("No database configured, users are kept in memory");
            Arc::new(UserService::new(
                Arc::new(InMemoryUserRepository::new()),
                Arc::clone(&audit),
                Arc::clone(&authenticator),
            ))
        }
    };

    let audit_sink: Arc<dyn AuditSink> = audit;
    let rate_limit_config = &config.rate_limit;
    let selected = BackendSelector::new(rate_limit_config.probe_timeout(), Arc::clone(&audit_sink))
        .with_connector(RedisConnector::new(
            rate_limit_config.redis_url.clone(),
            rate_limit_config.command_timeout(),
        ))
        .select()
        .await;
    tracing::info!(
        backend = %selected.backend,
        state = %selected.state,
        failure_policy = ?rate_limit_config.failure_policy,
        trusted_proxies = ?rate_limit_config.trusted_proxies,
        "Rate-limit backend selected"
    );

    let limiters = RateLimiters {
        default: Arc::new(
            RateLimiter::new(
                "global",
                RateLimit::parse_all(&rate_limit_config.default_limits)?,
                Arc::clone(&selected.store),
                Arc::clone(&audit_sink),
            )
            .with_failure_policy(rate_limit_config.failure_policy),
        ),
        login: Arc::new(
            RateLimiter::new(
                "login",
                RateLimit::parse_all(&rate_limit_config.login_limits)?,
                Arc::clone(&selected.store),
                Arc::clone(&audit_sink),
            )
            .with_failure_policy(rate_limit_config.failure_policy),
        ),
        trusted_proxies: rate_limit_config.trusted_proxies.clone(),
    };

    let state = AppState {
        user_service,
        authenticator,
        rate_limit_backend: Arc::from(selected.backend.as_str()),
    };

    let http_address = format!("{}:{}", config.server.host, config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(state, limiters);
    axum::serve(
        http_listener,
        http_application.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    tracing::info!("Server exited");

    Ok(())
}

fn build_authenticator(config: &Config) -> Result<Authenticator, anyhow::Error> {
    let hasher = PasswordHasher::with_params(HashParams {
        memory_kib: config.password.memory_kib,
        iterations: config.password.iterations,
        parallelism: config.password.parallelism,
    })?;
    let handler = JwtHandler::with_algorithm(config.jwt.secret.as_bytes(), &config.jwt.algorithm)?;
    let tokens = TokenService::new(handler)
        .with_default_lifetime(chrono::Duration::minutes(config.jwt.expiration_minutes))?;

    Ok(Authenticator::new(
        CredentialStore::new(PasswordPolicy::new(), hasher),
        tokens,
    ))
}
