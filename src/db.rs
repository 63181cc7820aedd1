use std::{str::FromStr, time::Duration};

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use time::OffsetDateTime;

use crate::{appresult::AppError, config::Config, res, AppResult};

pub async fn connect(config: &Config) -> anyhow::Result<SqlitePool> {
    open(&config.database_url, config.db_max_connections).await
}

/// Opens (creating if needed) the database at `url` and applies the schema.
pub async fn open(url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    apply_schema(&db_pool).await?;
    tracing::info!(url, max_connections, "database ready");
    Ok(db_pool)
}

pub async fn apply_schema(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(res::SCHEMA).execute(db_pool).await?;
    Ok(())
}

/// Timestamps are stored as unix milliseconds.
pub(crate) fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn from_millis(ms: i64) -> AppResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .map_err(|e| AppError::MalformedRecord(format!("timestamp {ms}: {e}")))
}

/// Current time at storage resolution, so in-memory and stored values order the same way.
pub(crate) fn now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(now)
}
