//! API configuration.

use std::path::PathBuf;
use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second, per client IP
    pub rate_limit_rps: u32,
    /// Max request body size (uploads included)
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Where uploads are stored
    pub upload_dir: PathBuf,
    /// Where encoder output is written
    pub processed_dir: PathBuf,
    /// Encodes allowed to run at once
    pub max_concurrent_encodes: usize,
    /// Encodes allowed to wait for a slot
    pub max_queued_encodes: usize,
    /// Kill an encode after this long
    pub encode_timeout: Option<Duration>,
    /// How long finished jobs stay queryable
    pub job_ttl: Duration,
    /// Serve Prometheus metrics at /metrics
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_body_size: 500 * 1024 * 1024, // 500MB
            environment: "development".to_string(),
            upload_dir: PathBuf::from("uploads"),
            processed_dir: PathBuf::from("processed"),
            max_concurrent_encodes: 2,
            max_queued_encodes: 8,
            encode_timeout: None,
            job_ttl: Duration::from_secs(3600),
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            processed_dir: std::env::var("PROCESSED_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.processed_dir),
            max_concurrent_encodes: env_parse("MAX_CONCURRENT_ENCODES")
                .unwrap_or(defaults.max_concurrent_encodes),
            max_queued_encodes: env_parse("MAX_QUEUED_ENCODES")
                .unwrap_or(defaults.max_queued_encodes),
            encode_timeout: env_parse::<u64>("ENCODE_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            job_ttl: env_parse("JOB_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_ttl),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.max_body_size, 500 * 1024 * 1024);
        assert_eq!(config.max_concurrent_encodes, 2);
        assert_eq!(config.max_queued_encodes, 8);
        assert!(config.encode_timeout.is_none());
        assert!(!config.is_production());
    }
}
