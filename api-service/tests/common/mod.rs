use std::net::IpAddr;
use std::net::SocketAddr;
use std::sync::Arc;

use api_service::domain::audit::ports::AuditSink;
use api_service::domain::ratelimit::limiter::RateLimiter;
use api_service::domain::ratelimit::models::RateLimit;
use api_service::domain::user::service::UserService;
use api_service::inbound::http::router::create_router;
use api_service::inbound::http::router::AppState;
use api_service::inbound::http::router::RateLimiters;
use api_service::outbound::audit::TracingAuditSink;
use api_service::outbound::ratelimit::BackendSelector;
use api_service::outbound::repositories::InMemoryUserRepository;
use auth::Authenticator;
use auth::CredentialStore;
use auth::HashParams;
use auth::JwtHandler;
use auth::PasswordHasher;
use auth::PasswordPolicy;
use auth::TokenService;

pub const JWT_SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";
pub const STRONG_PASSWORD: &str = "CorrectHorse9!Battery";

/// Test application that spawns a real server backed by in-memory storage
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub api_client: reqwest::Client,
    pub jwt_handler: JwtHandler,
}

impl TestApp {
    /// Spawn the application in a background task and return TestApp
    pub async fn spawn() -> Self {
        Self::spawn_with_login_limits(&["100 per minute"]).await
    }

    pub async fn spawn_with_login_limits(login_limits: &[&str]) -> Self {
        Self::spawn_with_options(login_limits, Vec::new()).await
    }

    /// Spawn the application as if it sat behind a reverse proxy on loopback
    pub async fn spawn_behind_proxy(login_limits: &[&str]) -> Self {
        let loopback: IpAddr = "127.0.0.1".parse().unwrap();
        Self::spawn_with_options(login_limits, vec![loopback]).await
    }

    async fn spawn_with_options(login_limits: &[&str], trusted_proxies: Vec<IpAddr>) -> Self {
        // Use random port (0 = OS assigns)
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        // Cheap hashing parameters keep the suite fast
        let hasher = PasswordHasher::with_params(HashParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .expect("Invalid hash parameters");
        let authenticator = Arc::new(Authenticator::new(
            CredentialStore::new(PasswordPolicy::new(), hasher),
            TokenService::new(JwtHandler::new(JWT_SECRET)),
        ));

        let audit = Arc::new(TracingAuditSink::new());
        let user_service = Arc::new(UserService::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::clone(&audit),
            Arc::clone(&authenticator),
        ));

        // No connectors configured: the selector lands on in-process counters
        let audit_sink: Arc<dyn AuditSink> = audit;
        let selected = BackendSelector::new(
            BackendSelector::DEFAULT_PROBE_TIMEOUT,
            Arc::clone(&audit_sink),
        )
        .select()
        .await;

        let limiters = RateLimiters {
            default: Arc::new(RateLimiter::new(
                "global",
                RateLimit::parse_all(&["1000 per minute"]).unwrap(),
                Arc::clone(&selected.store),
                Arc::clone(&audit_sink),
            )),
            login: Arc::new(RateLimiter::new(
                "login",
                RateLimit::parse_all(login_limits).unwrap(),
                Arc::clone(&selected.store),
                audit_sink,
            )),
            trusted_proxies,
        };

        let state = AppState {
            user_service,
            authenticator,
            rate_limit_backend: Arc::from(selected.backend.as_str()),
        };
        let router = create_router(state, limiters);

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Server error");
        });

        Self {
            address,
            port,
            api_client: reqwest::Client::new(),
            jwt_handler: JwtHandler::new(JWT_SECRET),
        }
    }

    /// Helper to make GET request
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(format!("{}{}", self.address, path))
    }

    /// Helper to make POST request
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(format!("{}{}", self.address, path))
    }

    /// Helper to make GET request with Bearer token
    pub fn get_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.get(path).bearer_auth(token)
    }

    /// Helper to make PUT request with Bearer token
    pub fn put_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.api_client
            .put(format!("{}{}", self.address, path))
            .bearer_auth(token)
    }

    /// Helper to make DELETE request with Bearer token
    pub fn delete_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.api_client
            .delete(format!("{}{}", self.address, path))
            .bearer_auth(token)
    }

    /// Register a user and return the response
    pub async fn register(&self, username: &str, email: &str, password: &str) -> reqwest::Response {
        self.post("/api/register")
            .json(&serde_json::json!({
                "username": username,
                "email": email,
                "password": password
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Log in and return the response
    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.login_request(username, password)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Build a login request without sending it
    pub fn login_request(&self, username: &str, password: &str) -> reqwest::RequestBuilder {
        self.post("/api/token").json(&serde_json::json!({
            "username": username,
            "password": password
        }))
    }

    /// Log in and return the access token, panicking on failure
    pub async fn token_for(&self, username: &str, password: &str) -> String {
        let response = self.login(username, password).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = response.json().await.expect("Failed to parse response");
        body["data"]["access_token"]
            .as_str()
            .expect("Missing access token")
            .to_string()
    }
}
