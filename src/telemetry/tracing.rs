use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::TelemetryConfig;

/// Log output settings for the binary.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub service_name: String,

    /// Default filter directive, e.g. `info` or `smpp_session=debug`
    pub log_level: String,

    /// One JSON object per event instead of human-readable lines
    pub json_logs: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: env!("CARGO_PKG_NAME").to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl From<&TelemetryConfig> for TracingConfig {
    fn from(config: &TelemetryConfig) -> Self {
        Self {
            log_level: config.log_level.clone(),
            json_logs: config.json_logs,
            ..Default::default()
        }
    }
}

/// `RUST_LOG` when set, otherwise the configured level.
fn env_filter(log_level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level: {}", log_level)),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(&config.log_level)?);

    let installed = if config.json_logs {
        registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(false))
            .try_init()
    } else {
        registry.with(fmt::layer().compact().with_target(false)).try_init()
    };
    installed.context("tracing subscriber already installed")?;

    info!(
        service = %config.service_name,
        log_level = %config.log_level,
        json = config.json_logs,
        "logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_telemetry_config() {
        let telemetry = TelemetryConfig {
            log_level: "smpp_session=trace".into(),
            json_logs: true,
        };
        let config = TracingConfig::from(&telemetry);
        assert_eq!(config.service_name, "smpp-session");
        assert_eq!(config.log_level, "smpp_session=trace");
        assert!(config.json_logs);
    }

    #[test]
    fn test_invalid_level_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(env_filter("info").is_ok());
        assert!(env_filter("smpp_session=verbose").is_err());
    }
}
