use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_key: String,
    pub marker_span_deg: f64,
    pub max_count_queries: usize,
}

impl Config {
    pub fn load() -> Self {
        let config = Self {
            port: try_load("RUST_PORT", "1111"),
            database_url: try_load("DATABASE_URL", "postgres://localhost/civic"),
            jwt_key: read_secret("JWT_KEY"),
            marker_span_deg: try_load("MARKER_SPAN_DEG", "0.2"),
            max_count_queries: try_load("MAX_COUNT_QUERIES", "32"),
        };

        config
            .validate()
            .map_err(|e| {
                warn!("Invalid configuration: {e}");
            })
            .expect("Environment misconfigured!");

        config
    }

    fn validate(&self) -> Result<(), String> {
        if !self.marker_span_deg.is_finite() || self.marker_span_deg <= 0.0 {
            return Err("MARKER_SPAN_DEG must be a positive number of degrees".to_string());
        }

        if self.max_count_queries == 0 {
            return Err("MAX_COUNT_QUERIES must be at least 1".to_string());
        }

        if self.jwt_key.is_empty() {
            return Err("JWT_KEY must not be empty".to_string());
        }

        Ok(())
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

fn read_secret(secret_name: &str) -> String {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .expect("Secrets misconfigured!")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            port: 1111,
            database_url: "postgres://localhost/civic".to_string(),
            jwt_key: "test-signing-key".to_string(),
            marker_span_deg: 0.2,
            max_count_queries: 32,
        }
    }

    #[test]
    fn default_shape_is_valid() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_span() {
        let mut config = base_config();
        config.marker_span_deg = 0.0;

        assert!(config.validate().is_err());

        config.marker_span_deg = f64::NAN;

        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_query_cap() {
        let mut config = base_config();
        config.max_count_queries = 0;

        assert!(config.validate().is_err());
    }
}
