//! Lookup side of the user directory. Accounts themselves are owned by the
//! login layer; this module only resolves them.

use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    appresult::{parse_id, stored_id},
    AppResult,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    /// Shareable id used to find someone without exposing `id`.
    pub connection_id: Uuid,
    pub username: String,
    pub profile: Option<String>,
}

/// What a user may learn about someone they are about to connect with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub profile: Option<String>,
}

impl From<&User> for PublicProfile {
    fn from(user: &User) -> Self {
        PublicProfile {
            id: user.id,
            username: user.username.clone(),
            profile: user.profile.clone(),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    id: String,
    connection_id: String,
    username: String,
    profile: Option<String>,
}

impl TryFrom<UserRow> for User {
    type Error = crate::AppError;

    fn try_from(row: UserRow) -> AppResult<Self> {
        Ok(User {
            id: stored_id(&row.id)?,
            connection_id: stored_id(&row.connection_id)?,
            username: row.username,
            profile: row.profile,
        })
    }
}

pub async fn user_by_id(db_pool: &SqlitePool, id: Uuid) -> AppResult<Option<User>> {
    sqlx::query_as::<_, UserRow>("SELECT id,connection_id,username,profile FROM users WHERE id=?")
        .bind(id.to_string())
        .fetch_optional(db_pool)
        .await?
        .map(User::try_from)
        .transpose()
}

/// Fails with `InvalidArgument` when `connection_id` is not a well-formed id.
pub async fn user_by_connection_id(db_pool: &SqlitePool, connection_id: &str) -> AppResult<Option<User>> {
    let connection_id = parse_id("connection_id", connection_id.trim())?;

    sqlx::query_as::<_, UserRow>(
        "SELECT id,connection_id,username,profile FROM users WHERE connection_id=?",
    )
    .bind(connection_id.to_string())
    .fetch_optional(db_pool)
    .await?
    .map(User::try_from)
    .transpose()
}

pub async fn register_user(db_pool: &SqlitePool, username: &str, profile: Option<&str>) -> AppResult<User> {
    let user = User {
        id: Uuid::now_v7(),
        connection_id: Uuid::now_v7(),
        username: username.to_owned(),
        profile: profile.map(str::to_owned),
    };

    tracing::info!(user_id = %user.id, username, "registering user");
    sqlx::query("INSERT INTO users (id,connection_id,username,profile) VALUES (?,?,?,?)")
        .bind(user.id.to_string())
        .bind(user.connection_id.to_string())
        .bind(&user.username)
        .bind(&user.profile)
        .execute(db_pool)
        .await?;

    Ok(user)
}
