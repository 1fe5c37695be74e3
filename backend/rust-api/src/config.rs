use serde::Deserialize;
use std::env;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub gemini: GeminiConfig,
    /// Length of one elapsed-timer tick; one tick counts as one second.
    pub timer_tick_ms: u64,
    pub session_idle_ttl_secs: u64,
    /// Wall-clock cap on a single timer stream.
    pub sse_max_stream_secs: u64,
    /// `user:password` expected on `/metrics`.
    pub metrics_auth: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8081".to_string(),
            gemini: GeminiConfig::default(),
            timer_tick_ms: 1000,
            session_idle_ttl_secs: 6 * 3600,
            sse_max_stream_secs: 3 * 3600,
            metrics_auth: "admin:changeme".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Local .env is optional; real deployments pass plain env vars
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            // Override with environment variables (prefix: APP_)
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or(defaults.bind_addr);

        let api_key = settings
            .get_string("gemini.api_key")
            .or_else(|_| env::var("GEMINI_API_KEY"))
            .or_else(|_| env::var("API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());

        if api_key.is_none() {
            eprintln!("WARNING: API_KEY is not set; generation and grading requests will fail");
        }

        let base_url = settings
            .get_string("gemini.base_url")
            .or_else(|_| env::var("GEMINI_BASE_URL"))
            .unwrap_or(defaults.gemini.base_url);

        let model = settings
            .get_string("gemini.model")
            .or_else(|_| env::var("GEMINI_MODEL"))
            .unwrap_or(defaults.gemini.model);

        let request_timeout_secs = read_u64(
            &settings,
            "gemini.request_timeout_secs",
            "GEMINI_TIMEOUT_SECONDS",
        )
        .unwrap_or(defaults.gemini.request_timeout_secs);

        let timer_tick_ms = read_u64(&settings, "timer.tick_ms", "TIMER_TICK_MS")
            .unwrap_or(defaults.timer_tick_ms);

        let session_idle_ttl_secs = read_u64(
            &settings,
            "sessions.idle_ttl_secs",
            "SESSION_IDLE_TTL_SECONDS",
        )
        .unwrap_or(defaults.session_idle_ttl_secs);

        let sse_max_stream_secs = read_u64(&settings, "sse.max_stream_secs", "SSE_MAX_STREAM_SECONDS")
            .unwrap_or(defaults.sse_max_stream_secs);

        let metrics_auth = settings
            .get_string("metrics.auth")
            .or_else(|_| env::var("METRICS_AUTH"))
            .unwrap_or(defaults.metrics_auth);

        Ok(Config {
            bind_addr,
            gemini: GeminiConfig {
                api_key,
                base_url,
                model,
                request_timeout_secs,
            },
            timer_tick_ms,
            session_idle_ttl_secs,
            sse_max_stream_secs,
            metrics_auth,
        })
    }
}

/// Positive integer from the settings tree, falling back to a plain env var.
fn read_u64(settings: &config::Config, key: &str, env_key: &str) -> Option<u64> {
    settings
        .get_int(key)
        .ok()
        .and_then(|v| u64::try_from(v).ok())
        .or_else(|| env::var(env_key).ok().and_then(|v| v.parse::<u64>().ok()))
        .filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "APP__GEMINI__API_KEY",
            "GEMINI_API_KEY",
            "API_KEY",
            "GEMINI_MODEL",
            "TIMER_TICK_MS",
            "APP__TIMER__TICK_MS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_missing_key_is_not_fatal() {
        clear_env();
        let config = Config::load().unwrap();
        assert!(config.gemini.api_key.is_none());
        assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.timer_tick_ms, 1000);
    }

    #[test]
    #[serial]
    fn test_plain_api_key_env_is_accepted() {
        clear_env();
        env::set_var("API_KEY", "from-env");
        env::set_var("GEMINI_MODEL", "gemini-test");
        let config = Config::load().unwrap();
        assert_eq!(config.gemini.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.gemini.model, "gemini-test");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_prefixed_env_overrides() {
        clear_env();
        env::set_var("APP__GEMINI__API_KEY", "prefixed");
        env::set_var("API_KEY", "plain");
        env::set_var("TIMER_TICK_MS", "250");
        let config = Config::load().unwrap();
        assert_eq!(config.gemini.api_key.as_deref(), Some("prefixed"));
        assert_eq!(config.timer_tick_ms, 250);
        clear_env();
    }
}
