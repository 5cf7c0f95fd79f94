//! 联系人数据访问层（DAO）
//!
//! 负责所有联系人相关的数据库操作，写操作提交后通过变更总线通知订阅者。

use crate::im::contact::models::{Contact, SELF_CONTACT_ID};
use crate::im::live::{ChangeBus, LiveQuery, Table};
use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info};

/// 联系人 DAO（基于 sqlx）
#[derive(Clone)]
pub struct ContactDao {
    db: Pool<Sqlite>,
    bus: ChangeBus,
}

impl ContactDao {
    /// 创建新的联系人 DAO
    pub fn new(db: Pool<Sqlite>, bus: ChangeBus) -> Self {
        Self { db, bus }
    }

    /// 联系人总数（含本机用户）
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM contacts")
            .fetch_one(&self.db)
            .await
            .context("统计联系人数量失败")?;
        Ok(row.try_get::<i64, _>("cnt")?)
    }

    pub async fn insert(&self, contact: &Contact) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO contacts (id, name, icon, reply_model)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(contact.id)
        .bind(&contact.name)
        .bind(&contact.icon)
        .bind(&contact.reply_model)
        .execute(&self.db)
        .await
        .with_context(|| format!("插入联系人失败: id={}", contact.id))?;

        debug!("[ContactDAO] 插入联系人: {} ({})", contact.name, contact.id);
        self.bus.notify(&[Table::Contacts]);
        Ok(())
    }

    /// 所有非本机联系人，按 id 升序
    pub async fn load_all(&self) -> Result<Vec<Contact>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, icon, reply_model
            FROM contacts
            WHERE id != ?
            ORDER BY id ASC
            "#,
        )
        .bind(SELF_CONTACT_ID)
        .fetch_all(&self.db)
        .await
        .context("查询联系人列表失败")?;

        rows.iter().map(Self::row_to_contact).collect()
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Contact>> {
        let row = sqlx::query("SELECT id, name, icon, reply_model FROM contacts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("查询单个联系人失败")?;

        row.as_ref().map(Self::row_to_contact).transpose()
    }

    /// 实时联系人列表
    pub async fn observe_all(&self) -> Result<LiveQuery<Vec<Contact>>> {
        let dao = self.clone();
        LiveQuery::spawn(&self.bus, &[Table::Contacts], move || {
            let dao = dao.clone();
            async move { dao.load_all().await }
        })
        .await
    }

    /// 删除所有联系人（会话参与者与消息级联删除）
    pub async fn delete_all(&self) -> Result<u64> {
        let res = sqlx::query("DELETE FROM contacts")
            .execute(&self.db)
            .await
            .context("删除联系人失败")?;

        info!("[ContactDAO] 已删除 {} 个联系人", res.rows_affected());
        self.bus
            .notify(&[Table::Contacts, Table::ChatAttendees, Table::Messages]);
        Ok(res.rows_affected())
    }

    pub(crate) fn row_to_contact(row: &SqliteRow) -> Result<Contact> {
        Ok(Contact {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            icon: row.try_get("icon")?,
            reply_model: row.try_get("reply_model")?,
        })
    }
}
