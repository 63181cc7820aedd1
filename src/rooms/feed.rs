//! Room feeds built from the per-kind message tables.
//!
//! A feed is a bounded window: the newest `limit` messages *of each kind*,
//! not the newest `limit` overall. When one kind dominates recent activity
//! the older messages of the other kind still show up, and the result can
//! hold up to `limit * MessageKind::ALL.len()` entries.

use std::cmp::Ordering;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{AppError, AppResult};

use super::{
    msg::{self, Message, MessageKind},
    registry,
};

pub const DEFAULT_WINDOW: u32 = 25;

/// Chronological order. Timestamps collide at millisecond resolution, so the
/// message id is the tie-break.
pub fn feed_order(a: &Message, b: &Message) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Merges per-kind result sets, in any order, into one oldest-first sequence.
pub fn merge<I>(sources: I) -> Vec<Message>
where
    I: IntoIterator<Item = Vec<Message>>,
{
    let mut merged: Vec<Message> = sources.into_iter().flatten().collect();
    merged.sort_by(feed_order);
    merged
}

pub fn latest<I>(candidates: I) -> Option<Message>
where
    I: IntoIterator<Item = Message>,
{
    candidates.into_iter().max_by(feed_order)
}

pub async fn merge_recent(db_pool: &SqlitePool, room_id: Uuid, per_kind_limit: u32) -> AppResult<Vec<Message>> {
    let mut sources = Vec::with_capacity(MessageKind::ALL.len());
    for kind in MessageKind::ALL {
        sources.push(msg::recent(db_pool, kind, room_id, per_kind_limit).await?);
    }

    let merged = merge(sources);
    tracing::debug!(%room_id, per_kind_limit, messages = merged.len(), "feed merged");
    Ok(merged)
}

pub async fn last_message(db_pool: &SqlitePool, room_id: Uuid) -> AppResult<Option<Message>> {
    let mut candidates = Vec::with_capacity(MessageKind::ALL.len());
    for kind in MessageKind::ALL {
        candidates.extend(msg::latest(db_pool, kind, room_id).await?);
    }
    Ok(latest(candidates))
}

/// The feed of a room, as seen by one of its participants.
pub async fn recent_messages(db_pool: &SqlitePool, requester: Uuid, room_id: Uuid, window: u32) -> AppResult<Vec<Message>> {
    if registry::room_of(db_pool, room_id, requester).await?.is_none() {
        return Err(AppError::NotFound("room"));
    }
    merge_recent(db_pool, room_id, window).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        appresult::ErrorKind,
        db,
        directory::register_user,
        rooms::msg::{insert_message, testing::*, MessageBody},
    };

    fn stamps(messages: &[Message]) -> Vec<(MessageKind, time::OffsetDateTime)> {
        messages.iter().map(|m| (m.kind(), m.created_at)).collect()
    }

    #[test]
    fn interleaves_kinds_by_time() {
        let (room, sender) = (Uuid::now_v7(), Uuid::now_v7());
        // per-kind sources arrive newest first
        let texts = vec![text(room, sender, 3), text(room, sender, 1)];
        let images = vec![image(room, sender, 2)];

        let merged = merge([texts, images]);
        assert_eq!(
            stamps(&merged),
            vec![
                (MessageKind::Text, at(1)),
                (MessageKind::Image, at(2)),
                (MessageKind::Text, at(3)),
            ]
        );
    }

    #[test]
    fn equal_timestamps_break_on_id() {
        let (room, sender) = (Uuid::now_v7(), Uuid::now_v7());
        let first = text(room, sender, 5);
        let second = image(room, sender, 5);
        assert!(first.id < second.id);

        let merged = merge([vec![second.clone()], vec![first.clone()]]);
        assert_eq!(merged, vec![first.clone(), second.clone()]);
        assert_eq!(latest([second.clone(), first]), Some(second));
    }

    #[test]
    fn latest_across_kinds() {
        let (room, sender) = (Uuid::now_v7(), Uuid::now_v7());
        let newest = latest([text(room, sender, 5), image(room, sender, 7)]).unwrap();

        assert_eq!(newest.kind(), MessageKind::Image);
        assert_eq!(newest.created_at, at(7));
        assert_eq!(latest(Vec::new()), None);
    }

    async fn room_with_pair(db_pool: &SqlitePool) -> (Uuid, Uuid, Uuid) {
        let a = register_user(db_pool, "a", None).await.unwrap();
        let b = register_user(db_pool, "b", None).await.unwrap();
        let room = registry::create_connection(db_pool, a.id, b.id).await.unwrap().room_id;
        (room, a.id, b.id)
    }

    #[tokio::test]
    async fn window_is_per_kind() {
        let (_dir, db_pool) = db::testing::pool().await;
        let (room, a, b) = room_with_pair(&db_pool).await;

        // images are all newer than every text
        for i in 0..30 {
            insert_message(&db_pool, &text(room, a, i)).await.unwrap();
            insert_message(&db_pool, &image(room, b, 100 + i)).await.unwrap();
        }

        let feed = merge_recent(&db_pool, room, DEFAULT_WINDOW).await.unwrap();
        assert_eq!(feed.len(), 50);

        let texts: Vec<_> = feed.iter().filter(|m| m.kind() == MessageKind::Text).collect();
        let images: Vec<_> = feed.iter().filter(|m| m.kind() == MessageKind::Image).collect();
        assert_eq!(texts.len(), 25);
        assert_eq!(images.len(), 25);
        assert_eq!(texts[0].created_at, at(5));
        assert_eq!(images[0].created_at, at(105));
        assert!(feed.windows(2).all(|w| feed_order(&w[0], &w[1]) == Ordering::Less));
    }

    #[tokio::test]
    async fn last_message_of_room() {
        let (_dir, db_pool) = db::testing::pool().await;
        let (room, a, b) = room_with_pair(&db_pool).await;
        assert_eq!(last_message(&db_pool, room).await.unwrap(), None);

        insert_message(&db_pool, &text(room, a, 5)).await.unwrap();
        insert_message(&db_pool, &image(room, b, 7)).await.unwrap();
        insert_message(&db_pool, &text(room, b, 1)).await.unwrap();

        let last = last_message(&db_pool, room).await.unwrap().unwrap();
        assert_eq!(last.body, MessageBody::Image { image: "images/7.png".into() });
    }

    #[tokio::test]
    async fn outsiders_see_no_room() {
        let (_dir, db_pool) = db::testing::pool().await;
        let (room, a, _) = room_with_pair(&db_pool).await;
        let eve = register_user(&db_pool, "eve", None).await.unwrap();
        insert_message(&db_pool, &text(room, a, 1)).await.unwrap();

        let err = recent_messages(&db_pool, eve.id, room, DEFAULT_WINDOW).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let missing = recent_messages(&db_pool, a, Uuid::now_v7(), DEFAULT_WINDOW).await.unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        assert_eq!(recent_messages(&db_pool, a, room, DEFAULT_WINDOW).await.unwrap().len(), 1);
    }
}
