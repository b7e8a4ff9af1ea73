use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::{env, path::PathBuf, str::FromStr};

use crate::clock::Clock;

pub const MEMORY_DATABASE_URL: &str = "memory://";

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,

    // Rate limiting
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    pub payslip_cache_capacity: u64,

    /// `FAKETIME` freezes the clock for deterministic runs
    pub clock: Clock,

    pub log_dir: PathBuf,
    pub log_level: tracing::Level,

    /// Users loaded into the in-memory store
    pub seed_users_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let clock = match env::var("FAKETIME") {
            Ok(value) => Clock::parse_faketime(&value)
                .with_context(|| format!("FAKETIME `{value}` is not `YYYY-MM-DD HH:MM:SS`"))?,
            Err(_) => Clock::System,
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,

            rate_protected_per_min: parsed_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            payslip_cache_capacity: parsed_or("PAYSLIP_CACHE_CAPACITY", 10_000)?,

            clock,

            log_dir: env::var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("logs")),
            log_level: parsed_or("LOG_LEVEL", tracing::Level::DEBUG)?,

            seed_users_file: env::var("SEED_USERS_FILE").ok().map(PathBuf::from),
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with(MEMORY_DATABASE_URL)
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} has invalid value `{raw}`: {e}")),
        Err(_) => Ok(default),
    }
}
