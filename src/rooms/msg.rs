use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    appresult::stored_id,
    db::{self, from_millis, to_millis},
    AppError, AppResult,
};

use super::registry;

/// Each kind lives in its own table with its own payload column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    Image,
}

impl MessageKind {
    pub const ALL: [MessageKind; 2] = [MessageKind::Text, MessageKind::Image];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
        }
    }

    fn table(self) -> &'static str {
        match self {
            MessageKind::Text => "text_messages",
            MessageKind::Image => "image_messages",
        }
    }

    fn payload_column(self) -> &'static str {
        match self {
            MessageKind::Text => "message",
            MessageKind::Image => "image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageBody {
    Text { message: String },
    /// `image` is a reference to stored media, not the bytes.
    Image { image: String },
}

impl MessageBody {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::Text { .. } => MessageKind::Text,
            MessageBody::Image { .. } => MessageKind::Image,
        }
    }

    fn payload(&self) -> &str {
        match self {
            MessageBody::Text { message } => message,
            MessageBody::Image { image } => image,
        }
    }

    fn from_payload(kind: MessageKind, payload: String) -> Self {
        match kind {
            MessageKind::Text => MessageBody::Text { message: payload },
            MessageKind::Image => MessageBody::Image { image: payload },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    room_id: String,
    sender: String,
    payload: String,
    created_at: i64,
}

impl MessageRow {
    fn into_message(self, kind: MessageKind) -> AppResult<Message> {
        Ok(Message {
            id: stored_id(&self.id)?,
            room_id: stored_id(&self.room_id)?,
            sender: stored_id(&self.sender)?,
            created_at: from_millis(self.created_at)?,
            body: MessageBody::from_payload(kind, self.payload),
        })
    }
}

fn into_messages(kind: MessageKind, rows: Vec<MessageRow>) -> AppResult<Vec<Message>> {
    rows.into_iter().map(|row| row.into_message(kind)).collect()
}

/// The newest `limit` messages of one kind, newest first.
pub async fn recent(db_pool: &SqlitePool, kind: MessageKind, room_id: Uuid, limit: u32) -> AppResult<Vec<Message>> {
    let sql = format!(
        "SELECT id,room_id,sender,{} AS payload,created_at FROM {} \
         WHERE room_id=? ORDER BY created_at DESC, id DESC LIMIT ?",
        kind.payload_column(),
        kind.table(),
    );

    let rows = sqlx::query_as::<_, MessageRow>(&sql)
        .bind(room_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(db_pool)
        .await?;

    into_messages(kind, rows)
}

pub async fn latest(db_pool: &SqlitePool, kind: MessageKind, room_id: Uuid) -> AppResult<Option<Message>> {
    Ok(recent(db_pool, kind, room_id, 1).await?.into_iter().next())
}

#[cfg(test)]
pub async fn count(db_pool: &SqlitePool, kind: MessageKind, room_id: Uuid) -> AppResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE room_id=?", kind.table());
    let (count,): (i64,) = sqlx::query_as(&sql)
        .bind(room_id.to_string())
        .fetch_one(db_pool)
        .await?;
    Ok(count)
}

/// Message count of one kind for every room `user_id` is part of. Rooms without
/// messages of that kind are absent.
pub async fn counts_for_user(db_pool: &SqlitePool, kind: MessageKind, user_id: Uuid) -> AppResult<HashMap<Uuid, i64>> {
    let sql = format!(
        "SELECT m.room_id, COUNT(*) FROM {} m JOIN rooms r ON r.room_id=m.room_id \
         WHERE r.user1=? OR r.user2=? GROUP BY m.room_id",
        kind.table(),
    );

    let rows: Vec<(String, i64)> = sqlx::query_as(&sql)
        .bind(user_id.to_string())
        .bind(user_id.to_string())
        .fetch_all(db_pool)
        .await?;

    rows.into_iter()
        .map(|(room_id, count)| Ok((stored_id(&room_id)?, count)))
        .collect()
}

/// Latest message of one kind for every room `user_id` is part of.
pub async fn latest_for_user(db_pool: &SqlitePool, kind: MessageKind, user_id: Uuid) -> AppResult<HashMap<Uuid, Message>> {
    let sql = format!(
        "SELECT id,room_id,sender,payload,created_at FROM ( \
            SELECT m.id AS id, m.room_id AS room_id, m.sender AS sender, m.{} AS payload, \
                m.created_at AS created_at, \
                ROW_NUMBER() OVER (PARTITION BY m.room_id ORDER BY m.created_at DESC, m.id DESC) AS rn \
            FROM {} m JOIN rooms r ON r.room_id=m.room_id \
            WHERE r.user1=? OR r.user2=? \
         ) WHERE rn=1",
        kind.payload_column(),
        kind.table(),
    );

    let rows = sqlx::query_as::<_, MessageRow>(&sql)
        .bind(user_id.to_string())
        .bind(user_id.to_string())
        .fetch_all(db_pool)
        .await?;

    Ok(into_messages(kind, rows)?
        .into_iter()
        .map(|message| (message.room_id, message))
        .collect())
}

/// Appends a message as-is. Callers are responsible for room membership.
pub async fn insert_message(db_pool: &SqlitePool, message: &Message) -> AppResult<()> {
    let kind = message.kind();
    let sql = format!(
        "INSERT INTO {} (id,room_id,sender,{},created_at) VALUES (?,?,?,?,?)",
        kind.table(),
        kind.payload_column(),
    );

    sqlx::query(&sql)
        .bind(message.id.to_string())
        .bind(message.room_id.to_string())
        .bind(message.sender.to_string())
        .bind(message.body.payload())
        .bind(to_millis(message.created_at))
        .execute(db_pool)
        .await?;
    Ok(())
}

pub async fn send_message(db_pool: &SqlitePool, sender: Uuid, room_id: Uuid, body: MessageBody) -> AppResult<Message> {
    if body.payload().trim().is_empty() {
        return Err(AppError::InvalidArgument(format!(
            "{} message must not be empty",
            body.kind().as_str()
        )));
    }

    if registry::room_of(db_pool, room_id, sender).await?.is_none() {
        return Err(AppError::NotFound("room"));
    }

    let message = Message {
        id: Uuid::now_v7(),
        room_id,
        sender,
        created_at: db::now(),
        body,
    };
    insert_message(db_pool, &message).await?;

    tracing::debug!(message_id = %message.id, %room_id, kind = ?message.kind(), "message stored");
    Ok(message)
}


#[cfg(test)]
mod tests {
    use super::{testing::*, *};
    use crate::{appresult::ErrorKind, db, directory, rooms::registry};

    #[test]
    fn serializes_with_type_tag() {
        let room = Uuid::now_v7();
        let value = serde_json::to_value(image(room, Uuid::now_v7(), 0)).unwrap();

        assert_eq!(value["type"], "image");
        assert_eq!(value["image"], "images/0.png");
        assert!(value.get("message").is_none());
        assert_eq!(value["room_id"], room.to_string());
    }

    #[tokio::test]
    async fn recent_is_newest_first_per_kind() {
        let (_dir, db_pool) = db::testing::pool().await;
        let a = directory::register_user(&db_pool, "a", None).await.unwrap();
        let b = directory::register_user(&db_pool, "b", None).await.unwrap();
        let room = registry::create_connection(&db_pool, a.id, b.id).await.unwrap().room_id;

        for secs in [3, 1, 2] {
            insert_message(&db_pool, &text(room, a.id, secs)).await.unwrap();
        }
        insert_message(&db_pool, &image(room, b.id, 9)).await.unwrap();

        let texts = recent(&db_pool, MessageKind::Text, room, 2).await.unwrap();
        assert_eq!(texts.iter().map(|m| m.created_at).collect::<Vec<_>>(), vec![at(3), at(2)]);
        assert_eq!(count(&db_pool, MessageKind::Text, room).await.unwrap(), 3);
        assert_eq!(count(&db_pool, MessageKind::Image, room).await.unwrap(), 1);
        assert_eq!(latest(&db_pool, MessageKind::Image, room).await.unwrap().unwrap().created_at, at(9));
    }

    #[tokio::test]
    async fn outsiders_cannot_send() {
        let (_dir, db_pool) = db::testing::pool().await;
        let a = directory::register_user(&db_pool, "a", None).await.unwrap();
        let b = directory::register_user(&db_pool, "b", None).await.unwrap();
        let c = directory::register_user(&db_pool, "c", None).await.unwrap();
        let room = registry::create_connection(&db_pool, a.id, b.id).await.unwrap().room_id;

        let body = MessageBody::Text { message: "hi".into() };
        let err = send_message(&db_pool, c.id, room, body.clone()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let sent = send_message(&db_pool, b.id, room, body).await.unwrap();
        assert_eq!(sent.sender, b.id);
        assert_eq!(count(&db_pool, MessageKind::Text, room).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_payload_is_rejected() {
        let (_dir, db_pool) = db::testing::pool().await;
        let body = MessageBody::Image { image: "  ".into() };

        let err = send_message(&db_pool, Uuid::now_v7(), Uuid::now_v7(), body).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
