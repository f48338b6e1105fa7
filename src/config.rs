use crate::errors::{EngineError, EngineResult};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    /// Period of the simulated market feed that drives /ws
    pub feed_interval: Duration,
    pub feed_strike: f64,
    pub feed_rate: f64,
    /// Per-subscriber outbound queue length before messages are dropped
    pub ws_buffer: usize,
    /// Built dashboard to serve as the fallback route, if any
    pub frontend_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (env in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> EngineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let server_port = var_or("SERVER_PORT", "8000")
            .parse::<u16>()
            .map_err(|e| EngineError::Config(format!("SERVER_PORT: {e}")))?;

        let feed_interval_ms = var_or("FEED_INTERVAL_MS", "1000")
            .parse::<u64>()
            .map_err(|e| EngineError::Config(format!("FEED_INTERVAL_MS: {e}")))?;
        if feed_interval_ms == 0 {
            return Err(EngineError::Config("FEED_INTERVAL_MS: must be > 0".into()));
        }

        let feed_strike = var_or("FEED_STRIKE", "100")
            .parse::<f64>()
            .map_err(|e| EngineError::Config(format!("FEED_STRIKE: {e}")))?;
        if !(feed_strike.is_finite() && feed_strike > 0.0) {
            return Err(EngineError::Config(format!("FEED_STRIKE: must be > 0, got {feed_strike}")));
        }

        let feed_rate = var_or("FEED_RATE", "0.05")
            .parse::<f64>()
            .map_err(|e| EngineError::Config(format!("FEED_RATE: {e}")))?;
        if !feed_rate.is_finite() {
            return Err(EngineError::Config(format!("FEED_RATE: must be finite, got {feed_rate}")));
        }

        let ws_buffer = var_or("WS_BUFFER", "64")
            .parse::<usize>()
            .map_err(|e| EngineError::Config(format!("WS_BUFFER: {e}")))?
            .max(1);

        Ok(Self {
            server_host: var_or("SERVER_HOST", "0.0.0.0"),
            server_port,
            feed_interval: Duration::from_millis(feed_interval_ms),
            feed_strike,
            feed_rate,
            ws_buffer,
            frontend_dir: lookup("FRONTEND_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".into(),
            server_port: 8000,
            feed_interval: Duration::from_secs(1),
            feed_strike: 100.0,
            feed_rate: 0.05,
            ws_buffer: 64,
            frontend_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.server_port, 8000);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8000");
        assert_eq!(cfg.feed_interval, Duration::from_secs(1));
        assert_eq!(cfg.feed_strike, 100.0);
        assert_eq!(cfg.feed_rate, 0.05);
        assert_eq!(cfg.ws_buffer, 64);
        assert!(cfg.frontend_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("SERVER_HOST", "127.0.0.1"),
            ("SERVER_PORT", "9100"),
            ("FEED_INTERVAL_MS", "250"),
            ("FEED_RATE", "-0.01"),
            ("FRONTEND_DIR", "frontend/build"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:9100");
        assert_eq!(cfg.feed_interval, Duration::from_millis(250));
        assert_eq!(cfg.feed_rate, -0.01);
        assert_eq!(cfg.frontend_dir, Some(PathBuf::from("frontend/build")));
    }

    #[test]
    fn test_invalid_port_is_config_error() {
        let err = AppConfig::from_lookup(lookup_from(&[("SERVER_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("FEED_INTERVAL_MS", "0")])).unwrap_err();
        assert!(err.to_string().contains("FEED_INTERVAL_MS"));
    }

    #[test]
    fn test_non_positive_strike_rejected() {
        assert!(AppConfig::from_lookup(lookup_from(&[("FEED_STRIKE", "0")])).is_err());
    }
}
