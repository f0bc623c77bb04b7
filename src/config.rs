// Runtime settings. Every value can come from a flag or the environment
// (a .env file is loaded first by main), so no endpoint or secret is baked in.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;

use crate::constants;
use crate::retry::RetryPolicy;

#[derive(Args, Debug, Clone)]
pub struct ServerSettings {
    #[arg(long, env = "ASKBOARD_PORT", default_value_t = constants::DEFAULT_PORT, help = "Port for the web server.")]
    pub port: u16,
    #[arg(long, env = "ASKBOARD_TEMPLATES_DIR", default_value = "templates", help = "Directory holding the page templates.")]
    pub templates_dir: PathBuf,
    #[arg(long, env = "ASKBOARD_STATIC_DIR", default_value = "static", help = "Directory served under /static.")]
    pub static_dir: PathBuf,
}

/// Chat-completion endpoint used by the report lookup.
#[derive(Args, Debug, Clone)]
pub struct ChatSettings {
    #[arg(long = "chat-endpoint", env = "ASKBOARD_CHAT_ENDPOINT", default_value = constants::DEFAULT_CHAT_ENDPOINT)]
    pub endpoint: String,
    #[arg(long = "chat-api-key", env = "ASKBOARD_CHAT_API_KEY", default_value = "", hide_env_values = true,
          help = "Sent verbatim as the Authorization header.")]
    pub api_key: String,
    #[arg(long = "chat-model", env = "ASKBOARD_CHAT_MODEL", default_value = constants::DEFAULT_CHAT_MODEL)]
    pub model: String,
    #[arg(long, env = "ASKBOARD_MAX_ATTEMPTS", default_value_t = constants::DEFAULT_MAX_ATTEMPTS,
          help = "Total attempts per query when the transport fails.")]
    pub max_attempts: u32,
    #[arg(long, env = "ASKBOARD_BACKOFF_SECS", default_value_t = constants::DEFAULT_BACKOFF_SECS,
          help = "Fixed wait between attempts, in seconds.")]
    pub backoff_secs: f64,
    #[arg(long, env = "ASKBOARD_TIMEOUT_SECS", default_value_t = constants::DEFAULT_TIMEOUT_SECS,
          help = "Per-attempt request timeout, in seconds.")]
    pub timeout_secs: u64,
}

impl ChatSettings {
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            bail!("Chat endpoint is required");
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be at least 1");
        }
        self.retry_policy()?;
        if self.api_key.is_empty() {
            tracing::warn!("No chat API key configured; requests will carry an empty Authorization header");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let Ok(backoff) = Duration::try_from_secs_f64(self.backoff_secs) else {
            bail!("backoff_secs must be a non-negative number of seconds that fits a Duration");
        };
        Ok(RetryPolicy::new(self.max_attempts, backoff))
    }
}

/// Text-to-SQL service and the SQLite database its SQL runs against.
#[derive(Args, Debug, Clone)]
pub struct SqlSettings {
    #[arg(long, env = "ASKBOARD_VANNA_ENDPOINT", default_value = constants::DEFAULT_VANNA_ENDPOINT)]
    pub vanna_endpoint: String,
    #[arg(long, env = "ASKBOARD_VANNA_API_KEY", default_value = "", hide_env_values = true)]
    pub vanna_api_key: String,
    #[arg(long, env = "ASKBOARD_VANNA_MODEL", default_value = constants::DEFAULT_VANNA_MODEL)]
    pub vanna_model: String,
    #[arg(long, env = "ASKBOARD_DATABASE", default_value = constants::DEFAULT_DATABASE,
          help = "SQLite file path, or an http(s) URL downloaded once into the cache dir.")]
    pub database: String,
    #[arg(long, env = "ASKBOARD_CACHE_DIR", default_value = ".askboard-cache")]
    pub cache_dir: PathBuf,
    #[arg(long, env = "ASKBOARD_ALLOW_WRITES",
          help = "Open the database read-write instead of read-only.")]
    pub allow_writes: bool,
    #[arg(long, env = "ASKBOARD_VANNA_TIMEOUT_SECS", default_value_t = constants::DEFAULT_TIMEOUT_SECS)]
    pub vanna_timeout_secs: u64,
}

impl SqlSettings {
    pub fn validate(&self) -> Result<()> {
        if self.vanna_endpoint.trim().is_empty() {
            bail!("Text-to-SQL endpoint is required");
        }
        if self.database.trim().is_empty() {
            bail!("A database path or URL is required");
        }
        if self.vanna_timeout_secs == 0 {
            bail!("vanna_timeout_secs must be at least 1");
        }
        Ok(())
    }
}
