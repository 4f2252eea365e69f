use std::env;
use std::net::IpAddr;
use std::time::Duration;

use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::domain::ratelimit::models::FailurePolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Postgres URL; users are kept in memory when absent
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: String,
    pub expiration_minutes: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// Distributed counter store; in-process counters when absent
    pub redis_url: Option<String>,
    pub default_limits: Vec<String>,
    pub login_limits: Vec<String>,
    pub probe_timeout_secs: u64,
    pub command_timeout_ms: u64,
    pub failure_policy: FailurePolicy,
    /// Reverse proxies whose `X-Forwarded-For` header is believed.
    /// Empty means clients are keyed on the peer address only.
    pub trusted_proxies: Vec<IpAddr>,
}

impl RateLimitConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Legacy flat variables (SECRET_KEY, REDIS_URL, DATABASE_URL)
    /// 2. Environment variables (JWT__SECRET, RATE_LIMIT__REDIS_URL, etc.)
    /// 3. Environment-specific config file (config/{environment}.toml)
    /// 4. Default config file (config/default.toml)
    /// 5. Built-in defaults
    ///
    /// `jwt.secret` has no default and must be provided.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Example: RATE_LIMIT__DEFAULT_LIMITS="200 per day,50 per hour"
            .add_source(
                Environment::default()
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("rate_limit.default_limits")
                    .with_list_parse_key("rate_limit.login_limits")
                    .with_list_parse_key("rate_limit.trusted_proxies")
                    .try_parsing(true),
            )
            .set_override_option("jwt.secret", env::var("SECRET_KEY").ok())?
            .set_override_option("rate_limit.redis_url", env::var("REDIS_URL").ok())?
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .build()?;

        let config: Config = configuration.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        ConfigBuilder::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.http_port", 8080)?
            .set_default("database.max_connections", 5)?
            .set_default("jwt.algorithm", "HS256")?
            .set_default("jwt.expiration_minutes", 30)?
            .set_default("password.memory_kib", 19 * 1024)?
            .set_default("password.iterations", 2)?
            .set_default("password.parallelism", 1)?
            .set_default("rate_limit.default_limits", vec!["200 per day", "50 per hour"])?
            .set_default("rate_limit.login_limits", vec!["5 per minute"])?
            .set_default("rate_limit.probe_timeout_secs", 5)?
            .set_default("rate_limit.command_timeout_ms", 500)?
            .set_default("rate_limit.failure_policy", "fail_open")?
            .set_default("rate_limit.trusted_proxies", Vec::<String>::new())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.trim().is_empty() {
            return Err(ConfigError::Message("jwt.secret must not be empty".to_string()));
        }
        if self.jwt.expiration_minutes <= 0 {
            return Err(ConfigError::Message(
                "jwt.expiration_minutes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
