use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const DEFAULT_API_BASE_URL: &str = "http://localhost:54321";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
}

static RESOLVED: OnceLock<RuntimeConfig> = OnceLock::new();

fn from_env() -> RuntimeConfig {
    // A .env file is optional; real env vars win either way.
    let _ = dotenvy::dotenv();
    RuntimeConfig {
        api_base_url: std::env::var("TABLETS_API_BASE_URL").ok(),
        api_key: std::env::var("TABLETS_API_KEY").ok(),
    }
}

fn from_config_file() -> Option<RuntimeConfig> {
    let raw = std::fs::read_to_string("config.json").ok()?;
    serde_json::from_str(&raw).ok()
}

fn merged(env: RuntimeConfig, file: RuntimeConfig) -> RuntimeConfig {
    RuntimeConfig {
        api_base_url: env.api_base_url.or(file.api_base_url),
        api_key: env.api_key.or(file.api_key),
    }
}

fn resolve() -> RuntimeConfig {
    merged(from_env(), from_config_file().unwrap_or_default())
}

pub fn api_base_url() -> String {
    RESOLVED
        .get_or_init(resolve)
        .api_base_url
        .clone()
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
}

pub fn api_key() -> Option<String> {
    RESOLVED.get_or_init(resolve).api_key.clone()
}

pub fn init() {
    let _ = RESOLVED.get_or_init(resolve);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_values_win_over_the_config_file() {
        let env = RuntimeConfig {
            api_base_url: Some("http://env:54321".to_string()),
            api_key: None,
        };
        let file = RuntimeConfig {
            api_base_url: Some("http://file:54321".to_string()),
            api_key: Some("file-key".to_string()),
        };
        let resolved = merged(env, file);
        assert_eq!(resolved.api_base_url.as_deref(), Some("http://env:54321"));
        assert_eq!(resolved.api_key.as_deref(), Some("file-key"));
    }

    #[test]
    fn config_file_json_parses() {
        let cfg: RuntimeConfig = serde_json::from_str(
            r#"{ "api_base_url": "http://localhost:54321", "api_key": "anon" }"#,
        )
        .unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("anon"));
    }
}
