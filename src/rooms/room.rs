use std::sync::Arc;

use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{appresult::parse_id, config::Config, session::Caller, AppResult, AppState};

use super::{
    feed,
    msg::{self, Message, MessageBody},
    summary::{self, ConnectionSummary},
    Envelope, Payload,
};

#[derive(Debug, Deserialize)]
pub struct RoomQuery {
    pub room_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageQuery {
    pub room_id: String,
    #[serde(flatten)]
    pub body: MessageBody,
}

#[derive(Debug, Serialize)]
pub struct ChatsData {
    pub chats: Vec<ConnectionSummary>,
}

#[derive(Debug, Serialize)]
pub struct MessagesData {
    pub messages: Vec<Message>,
}

#[debug_handler(state = AppState)]
pub async fn chats(
    State(db_pool): State<SqlitePool>,
    Caller(user_id): Caller,
) -> AppResult<Json<Envelope<ChatsData>>> {
    let chats = summary::list_connections(&db_pool, user_id).await?;

    let message = if chats.is_empty() { "no chats found." } else { "all the chat connections." };
    Ok(Envelope::json(message, ChatsData { chats }))
}

#[debug_handler(state = AppState)]
pub async fn messages(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    Caller(user_id): Caller,
    Payload(RoomQuery { room_id }): Payload<RoomQuery>,
) -> AppResult<Json<Envelope<MessagesData>>> {
    let room_id = parse_id("room_id", &room_id)?;
    let messages = feed::recent_messages(&db_pool, user_id, room_id, config.feed_window).await?;

    Ok(Envelope::json("all the messages", MessagesData { messages }))
}

#[debug_handler(state = AppState)]
pub async fn send(
    State(db_pool): State<SqlitePool>,
    Caller(user_id): Caller,
    Payload(SendMessageQuery { room_id, body }): Payload<SendMessageQuery>,
) -> AppResult<Json<Envelope<Message>>> {
    let room_id = parse_id("room_id", &room_id)?;
    let message = msg::send_message(&db_pool, user_id, room_id, body).await?;

    Ok(Envelope::json("message sent", message))
}
