use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{appresult::parse_id, session::Caller, AppResult, AppState};

use super::{
    registry::{self, CreatedConnection, FoundConnection},
    Envelope, Payload,
};

#[derive(Debug, Deserialize)]
pub struct FindConnectionQuery {
    pub connection_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateConnectionQuery {
    pub user2_id: String,
}

#[debug_handler(state = AppState)]
pub async fn find_connection(
    State(db_pool): State<SqlitePool>,
    Caller(user_id): Caller,
    Payload(FindConnectionQuery { connection_id }): Payload<FindConnectionQuery>,
) -> AppResult<Json<Envelope<FoundConnection>>> {
    let found = registry::find_connection(&db_pool, user_id, &connection_id).await?;

    let message = if found.connected { "already connected." } else { "connection found." };
    Ok(Envelope::json(message, found))
}

#[debug_handler(state = AppState)]
pub async fn create_connection(
    State(db_pool): State<SqlitePool>,
    Caller(user_id): Caller,
    Payload(CreateConnectionQuery { user2_id }): Payload<CreateConnectionQuery>,
) -> AppResult<Json<Envelope<CreatedConnection>>> {
    let target = parse_id("user2_id", &user2_id)?;
    let outcome = registry::create_connection(&db_pool, user_id, target).await?;

    let message = if outcome.created { "connected successfully!" } else { "already connected." };
    Ok(Envelope::json(message, outcome))
}
