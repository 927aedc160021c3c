//! Server configuration
//!
//! Command-line flags first, environment variables override them, built-in
//! defaults fill the rest.

use std::time::Duration;

use clap::Parser;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Command-line flags
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "loyalty-server", version, about = "Loyalty order ledger")]
pub struct Flags {
    /// HTTP listen address
    #[arg(short = 'a', long = "address")]
    pub run_address: Option<String>,
    /// PostgreSQL connection URL
    #[arg(short = 'd', long = "database-uri")]
    pub database_uri: Option<String>,
    /// Accrual system base URL
    #[arg(short = 'r', long = "accrual-address")]
    pub accrual_system_address: Option<String>,
    /// JWT signing key
    #[arg(short = 'k', long = "key")]
    pub jwt_secret: Option<String>,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address (-a, env: RUN_ADDRESS)
    pub run_address: String,
    /// PostgreSQL connection URL (-d, env: DATABASE_URI)
    pub database_uri: String,
    /// Base URL of the accrual system (-r, env: ACCRUAL_SYSTEM_ADDRESS)
    pub accrual_system_address: String,
    /// HS256 signing key for user tokens (-k, env: JWT_SECRET)
    pub jwt_secret: String,
    /// Delay between accrual reconciliation cycles
    pub accrual_poll_interval: Duration,
    /// Per-request timeout for accrual lookups; `None` keeps the transport default
    pub accrual_request_timeout: Option<Duration>,
    /// Environment: development | staging | production
    pub environment: String,
}

impl Config {
    /// Require a secret outside development; `value` is already non-empty.
    fn require_secret(
        value: Option<String>,
        name: &str,
        environment: &str,
    ) -> Result<String, BoxError> {
        match value {
            Some(v) => Ok(v),
            None if environment != "development" => {
                Err(format!("{name} must be set in {environment} environment").into())
            }
            None => Ok(format!("dev-{name}-not-for-production")),
        }
    }

    /// Load configuration from flags and environment variables
    pub fn from_env(flags: &Flags) -> Result<Self, BoxError> {
        Self::from_lookup(flags, |name| std::env::var(name).ok())
    }

    /// Load configuration from flags and an arbitrary variable lookup
    pub fn from_lookup(
        flags: &Flags,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, BoxError> {
        // Non-empty variable wins over the flag
        let setting = |name: &str, flag: &Option<String>| {
            lookup(name)
                .filter(|s| !s.is_empty())
                .or_else(|| flag.clone().filter(|s| !s.is_empty()))
        };

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".into());

        Ok(Self {
            run_address: setting("RUN_ADDRESS", &flags.run_address)
                .unwrap_or_else(|| "127.0.0.1:8080".into()),
            database_uri: setting("DATABASE_URI", &flags.database_uri)
                .ok_or("DATABASE_URI (or -d) must be set")?,
            accrual_system_address: setting("ACCRUAL_SYSTEM_ADDRESS", &flags.accrual_system_address)
                .map(|s| normalize_base_url(&s))
                .unwrap_or_else(|| "http://127.0.0.1:8082".into()),
            jwt_secret: Self::require_secret(
                setting("JWT_SECRET", &flags.jwt_secret),
                "JWT_SECRET",
                &environment,
            )?,
            accrual_poll_interval: Duration::from_secs(
                lookup("ACCRUAL_POLL_INTERVAL_SECS")
                    .and_then(|s| s.parse().ok())
                    .filter(|&secs: &u64| secs > 0)
                    .unwrap_or(2),
            ),
            accrual_request_timeout: lookup("ACCRUAL_REQUEST_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|&secs: &u64| secs > 0)
                .map(Duration::from_secs),
            environment,
        })
    }
}

/// Accept `host:port` as well as full URLs and drop trailing slashes
fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}
