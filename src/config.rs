//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
#[allow(dead_code)]
pub enum ConfigError {
    #[error("Failed to load environment variables: {0}")]
    EnvLoad(#[from] dotenvy::Error),

    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0), // Bind to 0.0.0.0 for Railway/Docker
            port: 3000,
        }
    }
}

/// Guard pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GuardConfig {
    /// Deadline for each external call on the pre-check path
    pub pre_check_timeout_ms: u64,
    /// Deadline for each external call on the post-analysis path
    pub post_analyze_timeout_ms: u64,
    /// How long a cached decision stays valid
    pub cache_ttl_secs: u64,
    /// Entry count above which a put triggers an expiry sweep
    pub cache_max_entries: usize,
    /// Chaos injection is opt-in; production deployments leave this off
    pub chaos_enabled: bool,
    /// Probability of forcing the deliberation path when chaos is enabled
    pub chaos_probability: f64,
    /// Disable to run without a routing backend (degraded mode)
    pub routing_enabled: bool,
    /// Disable to run without the advisory voter panel
    pub advisors_enabled: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            pre_check_timeout_ms: 2_000,
            post_analyze_timeout_ms: 5_000,
            cache_ttl_secs: 30,
            cache_max_entries: 100,
            chaos_enabled: false,
            chaos_probability: 0.05,
            routing_enabled: true,
            advisors_enabled: true,
        }
    }
}

impl GuardConfig {
    pub fn pre_check_deadline(&self) -> Duration {
        Duration::from_millis(self.pre_check_timeout_ms)
    }

    pub fn post_analyze_deadline(&self) -> Duration {
        Duration::from_millis(self.post_analyze_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerConfig,
    pub guard: GuardConfig,
    pub cors: CorsConfig,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let server = ServerConfig {
            host: std::env::var("HOST")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or_else(|| ServerConfig::default().host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(|| ServerConfig::default().port),
        };

        let defaults = GuardConfig::default();
        let guard = GuardConfig {
            pre_check_timeout_ms: env_parsed("GUARD_PRE_CHECK_TIMEOUT_MS", defaults.pre_check_timeout_ms),
            post_analyze_timeout_ms: env_parsed("GUARD_POST_ANALYZE_TIMEOUT_MS", defaults.post_analyze_timeout_ms),
            cache_ttl_secs: env_parsed("GUARD_CACHE_TTL_SECS", defaults.cache_ttl_secs),
            cache_max_entries: env_parsed("GUARD_CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            chaos_enabled: env_parsed("GUARD_CHAOS_ENABLED", defaults.chaos_enabled),
            chaos_probability: env_parsed("GUARD_CHAOS_PROBABILITY", defaults.chaos_probability),
            routing_enabled: env_parsed("GUARD_ROUTING_ENABLED", defaults.routing_enabled),
            advisors_enabled: env_parsed("GUARD_ADVISORS_ENABLED", defaults.advisors_enabled),
        };

        if !(0.0..=1.0).contains(&guard.chaos_probability) {
            return Err(ConfigError::InvalidValue(format!(
                "GUARD_CHAOS_PROBABILITY must be in [0,1], got {}",
                guard.chaos_probability
            )));
        }

        let cors = CorsConfig {
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| CorsConfig::default().allowed_origins),
        };

        Ok(Self {
            server,
            guard,
            cors,
        })
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
