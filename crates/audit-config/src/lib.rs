//! Environment-driven configuration for the audit engine.
//!
//! All variables are optional; every field has a documented default per the
//! external interface contract. Configuration is read once at startup and
//! passed explicitly to the components that need it — no ambient globals.

#![deny(unsafe_code)]

use std::env;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub secret_key: Option<String>,
    pub env: Environment,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: Option<String>,
    pub metrics_interval_secs: u64,
    pub alert_cpu_threshold: f64,
    pub alert_memory_threshold: f64,
    pub alert_disk_threshold: f64,
    pub aws_region: String,
    pub fargate_cpu_price: f64,
    pub fargate_memory_price: f64,
}

impl Config {
    /// Build configuration from the process environment. Never fails: every
    /// field falls back to its documented default, with a warning logged for
    /// any value present but unparsable.
    pub fn from_env() -> Self {
        Self {
            secret_key: env::var("SECRET_KEY").ok(),
            env: parse_env("ENV"),
            redis_host: env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string()),
            redis_port: parse_or_default("REDIS_PORT", 6379),
            redis_password: env::var("REDIS_PASSWORD").ok(),
            metrics_interval_secs: parse_or_default("METRICS_INTERVAL", 5),
            alert_cpu_threshold: parse_or_default("ALERT_CPU_THRESHOLD", 80.0),
            alert_memory_threshold: parse_or_default("ALERT_MEMORY_THRESHOLD", 85.0),
            alert_disk_threshold: parse_or_default("ALERT_DISK_THRESHOLD", 90.0),
            aws_region: env::var("AWS_REGION").unwrap_or_else(|_| "ap-south-1".to_string()),
            fargate_cpu_price: parse_or_default("FARGATE_CPU_PRICE", 0.04048),
            fargate_memory_price: parse_or_default("FARGATE_MEMORY_PRICE", 0.00445),
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == Environment::Production
    }
}

fn parse_env(key: &str) -> Environment {
    match env::var(key).as_deref() {
        Ok("production") => Environment::Production,
        _ => Environment::Development,
    }
}

fn parse_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, raw, "could not parse environment variable, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults_without_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        for key in [
            "SECRET_KEY",
            "ENV",
            "REDIS_HOST",
            "REDIS_PORT",
            "METRICS_INTERVAL",
            "ALERT_CPU_THRESHOLD",
            "ALERT_MEMORY_THRESHOLD",
            "ALERT_DISK_THRESHOLD",
            "AWS_REGION",
            "FARGATE_CPU_PRICE",
            "FARGATE_MEMORY_PRICE",
        ] {
            unsafe { env::remove_var(key) };
        }
        let cfg = Config::from_env();
        assert_eq!(cfg.redis_host, "localhost");
        assert_eq!(cfg.redis_port, 6379);
        assert_eq!(cfg.metrics_interval_secs, 5);
        assert_eq!(cfg.alert_cpu_threshold, 80.0);
        assert_eq!(cfg.alert_memory_threshold, 85.0);
        assert_eq!(cfg.alert_disk_threshold, 90.0);
        assert_eq!(cfg.aws_region, "ap-south-1");
        assert!((cfg.fargate_cpu_price - 0.04048).abs() < 1e-9);
        assert!(!cfg.is_production());
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::set_var("ENV", "production");
            env::set_var("ALERT_CPU_THRESHOLD", "70");
        }
        let cfg = Config::from_env();
        assert!(cfg.is_production());
        assert_eq!(cfg.alert_cpu_threshold, 70.0);
        unsafe {
            env::remove_var("ENV");
            env::remove_var("ALERT_CPU_THRESHOLD");
        }
    }

    #[test]
    fn test_unparsable_value_falls_back_to_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe { env::set_var("REDIS_PORT", "not-a-port") };
        let cfg = Config::from_env();
        assert_eq!(cfg.redis_port, 6379);
        unsafe { env::remove_var("REDIS_PORT") };
    }
}
