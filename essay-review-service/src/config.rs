use anyhow::{Context, Result, bail};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Service configuration, read once at startup and handed to the adapters
#[derive(Clone)]
pub struct Settings {
    pub openrouter_api_key: String,
    pub model_name: String,
    pub temperature: f64,
    pub llm_timeout: Duration,
    /// Snippets requested per stage; 0 disables retrieval entirely
    pub retrieval_depth: usize,
    pub retrieval_timeout: Duration,
    pub port: u16,
    pub database_url: Option<String>,
    pub log_format: LogFormat,
}

impl Settings {
    /// Load from the process environment, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let openrouter_api_key = lookup("OPENROUTER_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .context("Required environment variable 'OPENROUTER_API_KEY' is not set")?;

        let temperature: f64 = parse_or(&lookup, "LLM_TEMPERATURE", 0.7)?;
        if !(0.0..=2.0).contains(&temperature) {
            bail!("LLM_TEMPERATURE must be between 0 and 2, got {temperature}");
        }

        let retrieval_enabled: bool = parse_or(&lookup, "RETRIEVAL_ENABLED", true)?;
        let retrieval_depth = if retrieval_enabled {
            parse_or(&lookup, "RETRIEVAL_DEPTH", 2)?
        } else {
            0
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        Ok(Self {
            openrouter_api_key,
            model_name: lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature,
            llm_timeout: Duration::from_secs(parse_or(&lookup, "LLM_TIMEOUT_SECS", 120)?),
            retrieval_depth,
            retrieval_timeout: Duration::from_secs(parse_or(
                &lookup,
                "RETRIEVAL_TIMEOUT_SECS",
                30,
            )?),
            port: parse_or(&lookup, "PORT", 8000)?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            log_format,
        })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("openrouter_api_key", &"<redacted>")
            .field("model_name", &self.model_name)
            .field("temperature", &self.temperature)
            .field("llm_timeout", &self.llm_timeout)
            .field("retrieval_depth", &self.retrieval_depth)
            .field("retrieval_timeout", &self.retrieval_timeout)
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("log_format", &self.log_format)
            .finish()
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} has invalid value {raw:?}: {e}")),
        None => Ok(default),
    }
}
