//! 会话数据访问层（DAO）
//!
//! 负责会话、会话参与者以及会话列表视图的数据库操作。

use crate::im::chat::models::{ChatDetail, ChatWithLastMessage};
use crate::im::contact::dao::ContactDao;
use crate::im::contact::{Contact, SELF_CONTACT_ID};
use crate::im::live::{ChangeBus, LiveQuery, Table};
use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashMap;
use tracing::{debug, info};

/// 会话列表视图依赖的表
const DETAIL_DEPS: &[Table] = &[
    Table::Chats,
    Table::ChatAttendees,
    Table::Contacts,
    Table::Messages,
];

/// 会话 DAO（基于 sqlx）
#[derive(Clone)]
pub struct ChatDao {
    db: Pool<Sqlite>,
    bus: ChangeBus,
}

impl ChatDao {
    /// 创建新的会话 DAO
    pub fn new(db: Pool<Sqlite>, bus: ChangeBus) -> Self {
        Self { db, bus }
    }

    /// 创建与 `attendee_id` 的单聊，返回新会话 ID
    ///
    /// 会话与参与者在同一事务内写入，参与者写入失败时会话一并回滚。
    pub async fn create_direct_chat(&self, attendee_id: i64) -> Result<i64> {
        let mut tx = self.db.begin().await.context("开启事务失败")?;

        let chat_id = sqlx::query("INSERT INTO chats DEFAULT VALUES")
            .execute(&mut *tx)
            .await
            .context("插入会话失败")?
            .last_insert_rowid();

        sqlx::query("INSERT INTO chat_attendees (chat_id, attendee_id) VALUES (?, ?)")
            .bind(chat_id)
            .bind(attendee_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("插入会话参与者失败: attendee_id={}", attendee_id))?;

        tx.commit().await.context("提交会话事务失败")?;

        debug!(
            "[ChatDAO] 创建单聊 chat_id={}, attendee_id={}",
            chat_id, attendee_id
        );
        self.bus.notify(&[Table::Chats, Table::ChatAttendees]);
        Ok(chat_id)
    }

    /// 所有会话详情，按最新消息时间倒序（无消息的会话排在最后）
    pub async fn load_all_details(&self) -> Result<Vec<ChatDetail>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                last_message_sender_id,
                last_message_text,
                last_message_media_uri,
                last_message_media_mime_type,
                last_message_timestamp
            FROM chat_with_last_message
            ORDER BY last_message_timestamp DESC, id DESC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("查询会话列表失败")?;

        let mut attendees = self.load_attendees(None).await?;
        let details = rows
            .iter()
            .map(|row| -> Result<ChatDetail> {
                let chat = Self::row_to_chat_with_last_message(row)?;
                Ok(ChatDetail {
                    attendees: attendees.remove(&chat.id).unwrap_or_default(),
                    chat_with_last_message: chat,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("[ChatDAO] 获取会话列表，共 {} 个会话", details.len());
        Ok(details)
    }

    /// 根据会话 ID 查询详情
    pub async fn load_detail_by_id(&self, chat_id: i64) -> Result<Option<ChatDetail>> {
        let row = sqlx::query(
            r#"
            SELECT
                id,
                last_message_sender_id,
                last_message_text,
                last_message_media_uri,
                last_message_media_mime_type,
                last_message_timestamp
            FROM chat_with_last_message
            WHERE id = ?
            "#,
        )
        .bind(chat_id)
        .fetch_optional(&self.db)
        .await
        .context("查询单个会话失败")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let chat = Self::row_to_chat_with_last_message(&row)?;
        let mut attendees = self.load_attendees(Some(chat_id)).await?;
        Ok(Some(ChatDetail {
            attendees: attendees.remove(&chat_id).unwrap_or_default(),
            chat_with_last_message: chat,
        }))
    }

    /// 实时会话列表
    pub async fn observe_all_details(&self) -> Result<LiveQuery<Vec<ChatDetail>>> {
        let dao = self.clone();
        LiveQuery::spawn(&self.bus, DETAIL_DEPS, move || {
            let dao = dao.clone();
            async move { dao.load_all_details().await }
        })
        .await
    }

    /// 实时单个会话详情（会话不存在时为 `None`）
    pub async fn observe_detail_by_id(
        &self,
        chat_id: i64,
    ) -> Result<LiveQuery<Option<ChatDetail>>> {
        let dao = self.clone();
        LiveQuery::spawn(&self.bus, DETAIL_DEPS, move || {
            let dao = dao.clone();
            async move { dao.load_detail_by_id(chat_id).await }
        })
        .await
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM chats")
            .fetch_one(&self.db)
            .await
            .context("统计会话数量失败")?;
        Ok(row.try_get::<i64, _>("cnt")?)
    }

    /// 会话的非本机参与者数量
    pub async fn count_attendees(&self, chat_id: i64) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS cnt FROM chat_attendees WHERE chat_id = ? AND attendee_id != ?",
        )
        .bind(chat_id)
        .bind(SELF_CONTACT_ID)
        .fetch_one(&self.db)
        .await
        .context("统计会话参与者失败")?;
        Ok(row.try_get::<i64, _>("cnt")?)
    }

    /// 删除所有会话（参与者与消息级联删除）
    pub async fn delete_all(&self) -> Result<u64> {
        let res = sqlx::query("DELETE FROM chats")
            .execute(&self.db)
            .await
            .context("删除会话失败")?;

        info!("[ChatDAO] 已删除 {} 个会话", res.rows_affected());
        self.bus
            .notify(&[Table::Chats, Table::ChatAttendees, Table::Messages]);
        Ok(res.rows_affected())
    }

    /// 查询非本机参与者，按会话分组；`chat_id` 为 `None` 时查询全部会话
    async fn load_attendees(&self, chat_id: Option<i64>) -> Result<HashMap<i64, Vec<Contact>>> {
        let rows = sqlx::query(
            r#"
            SELECT a.chat_id AS chat_id, c.id AS id, c.name AS name, c.icon AS icon,
                   c.reply_model AS reply_model
            FROM chat_attendees a
            JOIN contacts c ON c.id = a.attendee_id
            WHERE a.attendee_id != ? AND (? IS NULL OR a.chat_id = ?)
            ORDER BY a.chat_id ASC, c.id ASC
            "#,
        )
        .bind(SELF_CONTACT_ID)
        .bind(chat_id)
        .bind(chat_id)
        .fetch_all(&self.db)
        .await
        .context("查询会话参与者失败")?;

        let mut grouped: HashMap<i64, Vec<Contact>> = HashMap::new();
        for row in &rows {
            let chat_id: i64 = row.try_get("chat_id")?;
            grouped
                .entry(chat_id)
                .or_default()
                .push(ContactDao::row_to_contact(row)?);
        }
        Ok(grouped)
    }

    fn row_to_chat_with_last_message(row: &SqliteRow) -> Result<ChatWithLastMessage> {
        Ok(ChatWithLastMessage {
            id: row.try_get("id")?,
            last_message_sender_id: row.try_get("last_message_sender_id")?,
            last_message_text: row.try_get("last_message_text")?,
            last_message_media_uri: row.try_get("last_message_media_uri")?,
            last_message_media_mime_type: row.try_get("last_message_media_mime_type")?,
            last_message_timestamp: row.try_get("last_message_timestamp")?,
        })
    }
}
