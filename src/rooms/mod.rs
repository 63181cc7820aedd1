pub mod feed;
pub mod msg;
pub mod registry;
pub mod summary;

mod new;
mod room;

use axum::{
    extract::FromRequest,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::{AppError, AppState};

pub use new::{create_connection, find_connection, CreateConnectionQuery, FindConnectionQuery};
pub use room::{chats, messages, send, ChatsData, MessagesData, RoomQuery, SendMessageQuery};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/find-connection", post(new::find_connection))
        .route("/create-connection", post(new::create_connection))
        .route("/chats", get(room::chats))
        .route("/messages", post(room::messages))
        .route("/send", post(room::send))
}

/// Success body: `{"message": .., "data": ..}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub message: &'static str,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn json(message: &'static str, data: T) -> Json<Self> {
        Json(Envelope { message, data })
    }
}

/// `Json` whose rejections come back in the error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct Payload<T>(pub T);
