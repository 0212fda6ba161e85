use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::{groq, imgbb, SamplingOptions};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub imgbb_api_key: String,
    pub imgbb_upload_url: String,
    pub imgbb_expiration_secs: Option<u64>,
    pub groq_api_key: String,
    pub groq_model: String,
    pub groq_chat_url: String,
    pub sampling: SamplingOptions,
    pub request_timeout: Duration,
    pub reveal_delay: Duration,
    pub bind_addr: String,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source (the process env in
    /// production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} must be set in .env file", key))
        };
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let defaults = SamplingOptions::default();

        Ok(Self {
            imgbb_api_key: required("IMGBB_API_KEY")?,
            imgbb_upload_url: text("IMGBB_UPLOAD_URL", imgbb::DEFAULT_UPLOAD_URL),
            imgbb_expiration_secs: parse_optional(&lookup, "IMGBB_EXPIRATION_SECS")?,
            groq_api_key: required("GROQ_API_KEY")?,
            groq_model: text("GROQ_MODEL", groq::DEFAULT_MODEL),
            groq_chat_url: text("GROQ_CHAT_URL", groq::DEFAULT_CHAT_URL),
            sampling: SamplingOptions {
                temperature: parse_or(&lookup, "INFERENCE_TEMPERATURE", defaults.temperature)?,
                max_completion_tokens: parse_or(
                    &lookup,
                    "INFERENCE_MAX_COMPLETION_TOKENS",
                    defaults.max_completion_tokens,
                )?,
                top_p: parse_or(&lookup, "INFERENCE_TOP_P", defaults.top_p)?,
            },
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 60)?),
            reveal_delay: Duration::from_millis(parse_or(&lookup, "RESULT_REVEAL_DELAY_MS", 500)?),
            bind_addr: text("BIND_ADDR", "0.0.0.0:8080"),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 32 * 1024 * 1024)?,
        })
    }

    /// Shared HTTP client; the timeout bounds every external call.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()?;
        Ok(client)
    }
}

fn parse_optional<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            let value = raw
                .trim()
                .parse()
                .with_context(|| format!("{} has an invalid value: '{}'", key, raw))?;
            Ok(Some(value))
        }
        _ => Ok(None),
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_optional(lookup, key)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("IMGBB_API_KEY", "img"), ("GROQ_API_KEY", "groq")]).unwrap();

        assert_eq!(config.imgbb_upload_url, "https://api.imgbb.com/1/upload");
        assert_eq!(config.groq_chat_url, "https://api.groq.com/openai/v1/chat/completions");
        assert_eq!(config.groq_model, "meta-llama/llama-4-scout-17b-16e-instruct");
        assert_eq!(config.imgbb_expiration_secs, None);
        assert_eq!(config.sampling, SamplingOptions::default());
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.reveal_delay, Duration::from_millis(500));
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("IMGBB_API_KEY", "img"),
            ("GROQ_API_KEY", "groq"),
            ("IMGBB_EXPIRATION_SECS", "600"),
            ("INFERENCE_TEMPERATURE", "0.7"),
            ("RESULT_REVEAL_DELAY_MS", "0"),
        ])
        .unwrap();

        assert_eq!(config.imgbb_expiration_secs, Some(600));
        assert_eq!(config.sampling.temperature, 0.7);
        assert_eq!(config.reveal_delay, Duration::ZERO);
    }

    #[test]
    fn test_missing_credentials_are_errors() {
        let err = config_from(&[("IMGBB_API_KEY", "img")]).unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY"));

        assert!(config_from(&[("IMGBB_API_KEY", " "), ("GROQ_API_KEY", "groq")]).is_err());
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        let err = config_from(&[
            ("IMGBB_API_KEY", "img"),
            ("GROQ_API_KEY", "groq"),
            ("REQUEST_TIMEOUT_SECS", "soon"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("REQUEST_TIMEOUT_SECS"));
    }
}
