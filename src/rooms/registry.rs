use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    appresult::stored_id,
    db::{self, from_millis, to_millis},
    directory::{self, PublicProfile},
    AppError, AppResult,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub room_id: Uuid,
    /// Who asked for the connection. Carries no meaning beyond history.
    pub user1: Uuid,
    pub user2: Uuid,
    pub created_at: OffsetDateTime,
}

impl Room {
    /// The participant that isn't `user_id`, if `user_id` is in the room at all.
    pub fn other(&self, user_id: Uuid) -> Option<Uuid> {
        if self.user1 == self.user2 {
            None
        } else if self.user1 == user_id {
            Some(self.user2)
        } else if self.user2 == user_id {
            Some(self.user1)
        } else {
            None
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct RoomRow {
    pub(crate) room_id: String,
    pub(crate) user1: String,
    pub(crate) user2: String,
    pub(crate) created_at: i64,
}

impl TryFrom<RoomRow> for Room {
    type Error = AppError;

    fn try_from(row: RoomRow) -> AppResult<Self> {
        Ok(Room {
            room_id: stored_id(&row.room_id)?,
            user1: stored_id(&row.user1)?,
            user2: stored_id(&row.user2)?,
            created_at: from_millis(row.created_at)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoundConnection {
    pub connection: PublicProfile,
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreatedConnection {
    pub created: bool,
    pub room_id: Uuid,
}

/// Order-independent key for a pair: (a, b) and (b, a) map to the same value.
pub fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b { (a, b) } else { (b, a) }
}

/// The room joining `a` and `b`, whichever of them created it.
pub async fn room_between(db_pool: &SqlitePool, a: Uuid, b: Uuid) -> AppResult<Option<Room>> {
    let (lo, hi) = canonical_pair(a, b);

    sqlx::query_as::<_, RoomRow>(
        "SELECT room_id,user1,user2,created_at FROM rooms WHERE user_lo=? AND user_hi=?",
    )
    .bind(lo.to_string())
    .bind(hi.to_string())
    .fetch_optional(db_pool)
    .await?
    .map(Room::try_from)
    .transpose()
}

/// `room_id` if it exists and `participant` is in it. Rooms the caller isn't
/// part of are indistinguishable from missing ones.
pub async fn room_of(db_pool: &SqlitePool, room_id: Uuid, participant: Uuid) -> AppResult<Option<Room>> {
    sqlx::query_as::<_, RoomRow>(
        "SELECT room_id,user1,user2,created_at FROM rooms WHERE room_id=? AND (user1=? OR user2=?)",
    )
    .bind(room_id.to_string())
    .bind(participant.to_string())
    .bind(participant.to_string())
    .fetch_optional(db_pool)
    .await?
    .map(Room::try_from)
    .transpose()
}

/// Rooms `user_id` is part of, oldest first.
pub async fn rooms_of(db_pool: &SqlitePool, user_id: Uuid) -> AppResult<Vec<Room>> {
    sqlx::query_as::<_, RoomRow>(
        "SELECT room_id,user1,user2,created_at FROM rooms WHERE user1=? OR user2=? \
         ORDER BY created_at, room_id",
    )
    .bind(user_id.to_string())
    .bind(user_id.to_string())
    .fetch_all(db_pool)
    .await?
    .into_iter()
    .map(Room::try_from)
    .collect()
}

/// Looks up who `target_connection_id` belongs to and whether the requester is
/// already connected to them. Never writes.
pub async fn find_connection(
    db_pool: &SqlitePool,
    requester: Uuid,
    target_connection_id: &str,
) -> AppResult<FoundConnection> {
    let target = directory::user_by_connection_id(db_pool, target_connection_id)
        .await?
        .ok_or(AppError::NotFound("connection with this id"))?;

    let requester = directory::user_by_id(db_pool, requester)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    if target.connection_id == requester.connection_id {
        return Err(AppError::SelfReference);
    }

    let connected = room_between(db_pool, requester.id, target.id).await?.is_some();

    Ok(FoundConnection {
        connection: PublicProfile::from(&target),
        connected,
    })
}

/// Creates the room for the pair unless one exists. Safe to call concurrently:
/// the unique canonical pair decides the single winner.
pub async fn create_connection(db_pool: &SqlitePool, requester: Uuid, target: Uuid) -> AppResult<CreatedConnection> {
    if directory::user_by_id(db_pool, target).await?.is_none() {
        return Err(AppError::NotFound("user"));
    }
    if requester == target {
        return Err(AppError::SelfReference);
    }
    if directory::user_by_id(db_pool, requester).await?.is_none() {
        return Err(AppError::Unauthenticated);
    }

    let (lo, hi) = canonical_pair(requester, target);
    let room_id = Uuid::now_v7();

    let inserted = sqlx::query(
        "INSERT INTO rooms (room_id,user1,user2,user_lo,user_hi,created_at) VALUES (?,?,?,?,?,?) \
         ON CONFLICT(user_lo,user_hi) DO NOTHING",
    )
    .bind(room_id.to_string())
    .bind(requester.to_string())
    .bind(target.to_string())
    .bind(lo.to_string())
    .bind(hi.to_string())
    .bind(to_millis(db::now()))
    .execute(db_pool)
    .await?
    .rows_affected();

    if inserted == 1 {
        tracing::info!(%room_id, %requester, %target, "connection created");
        return Ok(CreatedConnection { created: true, room_id });
    }

    let existing = room_between(db_pool, requester, target)
        .await?
        .ok_or_else(|| AppError::Conflict("room insert ignored but no room exists".to_owned()))?;

    tracing::debug!(room_id = %existing.room_id, %requester, %target, "already connected");
    Ok(CreatedConnection { created: false, room_id: existing.room_id })
}
