use std::{net::SocketAddr, str::FromStr};

use anyhow::Context;

use crate::rooms::feed::DEFAULT_WINDOW;

#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: String,
    pub log_level: String,
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    /// Messages taken from each variant when building a room feed.
    pub feed_window: u32,
    pub session_inactivity_minutes: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            app_env: var_or("APP_ENV", "development"),
            log_level: var_or("LOG_LEVEL", "info"),
            database_url: var_or("DATABASE_URL", "sqlite://duochat.db"),
            bind_addr: parsed_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            db_max_connections: parsed_or("DB_MAX_CONNECTIONS", 16)?,
            feed_window: parsed_or("FEED_WINDOW", DEFAULT_WINDOW)?,
            session_inactivity_minutes: parsed_or("SESSION_INACTIVITY_MINUTES", 5)?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }
}

fn var_or(key: &str, default: &str) -> String {
    dotenv::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parsed_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match dotenv::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} has an invalid value {raw:?}")),
        Err(_) => Ok(default),
    }
}
