use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use harj_chat::responder::{DEFAULT_REPLY_MAX, DEFAULT_REPLY_MIN};

/// Server settings, read from `HARJ_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `None` keeps everything in memory
    pub db_path: Option<PathBuf>,
    /// JSON array of user profiles; `None` seeds the site owner only
    pub users_file: Option<PathBuf>,
    pub auto_reply: bool,
    pub reply_min: Duration,
    pub reply_max: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("HARJ_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = match var("HARJ_PORT") {
            Some(raw) => raw.parse().with_context(|| format!("HARJ_PORT is not a port: {}", raw))?,
            None => 3000,
        };
        let auto_reply = match var("HARJ_AUTO_REPLY") {
            Some(raw) => parse_bool(&raw).with_context(|| format!("HARJ_AUTO_REPLY is not a boolean: {}", raw))?,
            None => true,
        };
        let reply_min = millis(var("HARJ_REPLY_MIN_MS"), "HARJ_REPLY_MIN_MS", DEFAULT_REPLY_MIN)?;
        let reply_max = millis(var("HARJ_REPLY_MAX_MS"), "HARJ_REPLY_MAX_MS", DEFAULT_REPLY_MAX)?;
        if reply_max < reply_min {
            bail!("HARJ_REPLY_MAX_MS must not be below HARJ_REPLY_MIN_MS");
        }

        Ok(Self {
            host,
            port,
            db_path: var("HARJ_DB_PATH").map(PathBuf::from),
            users_file: var("HARJ_USERS_FILE").map(PathBuf::from),
            auto_reply,
            reply_min,
            reply_max,
        })
    }
}

fn millis(raw: Option<String>, key: &str, default: Duration) -> anyhow::Result<Duration> {
    match raw {
        Some(raw) => {
            let ms: u64 = raw
                .parse()
                .with_context(|| format!("{} is not a number of milliseconds: {}", key, raw))?;
            Ok(Duration::from_millis(ms))
        }
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
