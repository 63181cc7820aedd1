use std::collections::HashMap;

use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    directory::{User, UserRow},
    AppResult,
};

use super::{
    feed,
    msg::{self, Message, MessageKind},
    registry::{self, Room},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    pub username: String,
    pub profile: Option<String>,
    pub room_id: Uuid,
    pub total_messages: i64,
    pub last_message: Option<Message>,
}

/// Every room `user_id` is in, busiest first. Rooms with equal totals keep
/// creation order. A user without rooms gets an empty list.
///
/// Aggregates are fetched once per message kind for all rooms together, so
/// the number of queries does not grow with the number of rooms.
pub async fn list_connections(db_pool: &SqlitePool, user_id: Uuid) -> AppResult<Vec<ConnectionSummary>> {
    let rooms = registry::rooms_of(db_pool, user_id).await?;
    if rooms.is_empty() {
        return Ok(Vec::new());
    }

    let mut participants = counterparts(db_pool, user_id).await?;
    let mut totals: HashMap<Uuid, i64> = HashMap::new();
    let mut candidates: HashMap<Uuid, Vec<Message>> = HashMap::new();
    for kind in MessageKind::ALL {
        for (room_id, count) in msg::counts_for_user(db_pool, kind, user_id).await? {
            *totals.entry(room_id).or_default() += count;
        }
        for (room_id, message) in msg::latest_for_user(db_pool, kind, user_id).await? {
            candidates.entry(room_id).or_default().push(message);
        }
    }

    let mut summaries = Vec::with_capacity(rooms.len());
    for room in rooms {
        let Some(other) = counterpart(&mut participants, &room, user_id) else {
            continue;
        };

        summaries.push(ConnectionSummary {
            username: other.username,
            profile: other.profile,
            room_id: room.room_id,
            total_messages: totals.get(&room.room_id).copied().unwrap_or(0),
            last_message: feed::latest(candidates.remove(&room.room_id).unwrap_or_default()),
        });
    }

    summaries.sort_by(|a, b| b.total_messages.cmp(&a.total_messages));
    Ok(summaries)
}

/// Everyone `user_id` shares a room with, keyed by their id.
async fn counterparts(db_pool: &SqlitePool, user_id: Uuid) -> AppResult<HashMap<Uuid, User>> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT DISTINCT u.id AS id, u.connection_id AS connection_id, u.username AS username, \
         u.profile AS profile FROM rooms r \
         JOIN users u ON u.id = CASE WHEN r.user1=? THEN r.user2 ELSE r.user1 END \
         WHERE r.user1=? OR r.user2=?",
    )
    .bind(user_id.to_string())
    .bind(user_id.to_string())
    .bind(user_id.to_string())
    .fetch_all(db_pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let user = User::try_from(row)?;
            Ok((user.id, user))
        })
        .collect()
}

fn counterpart(participants: &mut HashMap<Uuid, User>, room: &Room, user_id: Uuid) -> Option<User> {
    let Some(other_id) = room.other(user_id) else {
        tracing::warn!(room_id = %room.room_id, %user_id, "skipping room without a counterpart");
        return None;
    };

    // each counterpart shares exactly one room with `user_id`
    let other = participants.remove(&other_id);
    if other.is_none() {
        tracing::warn!(room_id = %room.room_id, %other_id, "skipping room with unknown participant");
    }
    other
}
