//! 消息数据访问层（DAO）
//!
//! 负责所有消息相关的数据库操作，将数据访问逻辑与业务逻辑分离

use crate::im::live::{ChangeBus, LiveQuery, Table};
use crate::im::message::models::Message;
use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info};

/// 本地消息存储（sqlx / SQLite 单表）
#[derive(Clone)]
pub struct MessageDao {
    db: Pool<Sqlite>,
    bus: ChangeBus,
}

impl MessageDao {
    pub fn new(db: Pool<Sqlite>, bus: ChangeBus) -> Self {
        Self { db, bus }
    }

    /// 插入一条消息，返回自增 ID（忽略 `msg.id`）
    pub async fn insert(&self, msg: &Message) -> Result<i64> {
        let res = sqlx::query(
            r#"
            INSERT INTO messages (chat_id, sender_id, text, media_uri, media_mime_type, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(msg.chat_id)
        .bind(msg.sender_id)
        .bind(&msg.text)
        .bind(&msg.media_uri)
        .bind(&msg.media_mime_type)
        .bind(msg.timestamp)
        .execute(&self.db)
        .await
        .with_context(|| format!("插入消息失败: chat_id={}", msg.chat_id))?;

        let id = res.last_insert_rowid();
        debug!(
            "[MessageDAO] 插入消息 id={}, chat_id={}, sender_id={}",
            id, msg.chat_id, msg.sender_id
        );
        self.bus.notify(&[Table::Messages]);
        Ok(id)
    }

    /// 会话内全部消息，按时间倒序（同一时间戳按 ID 倒序）
    pub async fn load_all(&self, chat_id: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            r#"
            SELECT id, chat_id, sender_id, text, media_uri, media_mime_type, timestamp
            FROM messages
            WHERE chat_id = ?
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.db)
        .await
        .context("查询会话消息失败")?;

        rows.iter().map(Self::row_to_message).collect()
    }

    /// 实时消息列表
    pub async fn observe_all(&self, chat_id: i64) -> Result<LiveQuery<Vec<Message>>> {
        let dao = self.clone();
        LiveQuery::spawn(&self.bus, &[Table::Messages], move || {
            let dao = dao.clone();
            async move { dao.load_all(chat_id).await }
        })
        .await
    }

    pub async fn count_by_chat(&self, chat_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM messages WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_one(&self.db)
            .await
            .context("统计会话消息数量失败")?;
        Ok(row.try_get::<i64, _>("cnt")?)
    }

    /// 清空所有消息
    pub async fn delete_all(&self) -> Result<u64> {
        let res = sqlx::query("DELETE FROM messages")
            .execute(&self.db)
            .await
            .context("清空消息失败")?;

        info!("[MessageDAO] 已清空 {} 条消息", res.rows_affected());
        self.bus.notify(&[Table::Messages]);
        Ok(res.rows_affected())
    }

    fn row_to_message(row: &SqliteRow) -> Result<Message> {
        Ok(Message {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            sender_id: row.try_get("sender_id")?,
            text: row.try_get("text")?,
            media_uri: row.try_get("media_uri")?,
            media_mime_type: row.try_get("media_mime_type")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::im::db::create_sqlite_pool_with_migration;
    use std::time::Duration;
    use tokio::time::timeout;

    /// 建库并准备两个会话（1、2）与联系人 0、1
    async fn new_dao() -> Result<MessageDao> {
        let pool = create_sqlite_pool_with_migration("sqlite::memory:", 1).await?;
        sqlx::query(
            r#"
            INSERT INTO contacts (id, name, icon, reply_model) VALUES
                (0, 'You', 'you.jpg', ''),
                (1, 'Cat', 'cat.jpg', 'Meow');
            INSERT INTO chats (id) VALUES (1), (2);
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(MessageDao::new(pool, ChangeBus::new()))
    }

    #[tokio::test]
    async fn insert_returns_generated_ids() -> Result<()> {
        let dao = new_dao().await?;
        let first = dao.insert(&Message::new(1, 0, "hi", None, None, 10)).await?;
        let second = dao.insert(&Message::new(1, 1, "Meow", None, None, 20)).await?;
        assert!(first > 0);
        assert!(second > first);
        Ok(())
    }

    #[tokio::test]
    async fn load_all_is_newest_first_and_filtered_by_chat() -> Result<()> {
        let dao = new_dao().await?;
        dao.insert(&Message::new(1, 0, "old", None, None, 100)).await?;
        dao.insert(&Message::new(1, 1, "new", None, None, 300)).await?;
        dao.insert(&Message::new(1, 0, "middle", None, None, 200))
            .await?;
        dao.insert(&Message::new(2, 0, "other chat", None, None, 999))
            .await?;

        let messages = dao.load_all(1).await?;
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["new", "middle", "old"]);
        assert_eq!(dao.count_by_chat(2).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn media_fields_round_trip_as_options() -> Result<()> {
        let dao = new_dao().await?;
        dao.insert(&Message::new(
            1,
            0,
            "look",
            Some("content://media/1".to_string()),
            Some("image/jpeg".to_string()),
            5,
        ))
        .await?;
        dao.insert(&Message::new(1, 0, "plain", None, None, 1)).await?;

        let messages = dao.load_all(1).await?;
        assert_eq!(messages[0].media_mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(messages[1].media_uri, None);
        Ok(())
    }

    #[tokio::test]
    async fn insert_into_missing_chat_fails() -> Result<()> {
        let dao = new_dao().await?;
        assert!(dao
            .insert(&Message::new(404, 0, "lost", None, None, 1))
            .await
            .is_err());
        Ok(())
    }

    #[tokio::test]
    async fn observe_all_tracks_inserts_and_wipe() -> Result<()> {
        let dao = new_dao().await?;
        let mut live = dao.observe_all(1).await?;
        assert!(live.current().is_empty());

        dao.insert(&Message::new(1, 0, "hi", None, None, 1)).await?;
        timeout(Duration::from_secs(2), live.wait_until(|m| m.len() == 1)).await?;

        assert_eq!(dao.delete_all().await?, 1);
        timeout(Duration::from_secs(2), live.wait_until(|m| m.is_empty())).await?;
        Ok(())
    }
}
