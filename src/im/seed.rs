//! 演示数据初始化
//!
//! 首次启动时写入本机用户、演示联系人、每个联系人的单聊以及两条开场消息。

use crate::im::chat::ChatDao;
use crate::im::contact::{demo_contacts, Contact, ContactDao};
use crate::im::message::{Message, MessageDao};
use anyhow::Result;
use tracing::info;

/// 每个演示会话的开场消息（按时间先后）
pub const SEED_MESSAGES: [&str; 2] = ["Send me a message", "I will reply in 5 seconds"];

/// 演示会话之间的时间间隔（毫秒）
const SEED_SPACING_MS: i64 = 60_000;

/// 演示数据写入器
#[derive(Clone)]
pub struct Seeder {
    contact_dao: ContactDao,
    chat_dao: ChatDao,
    message_dao: MessageDao,
}

impl Seeder {
    pub fn new(contact_dao: ContactDao, chat_dao: ChatDao, message_dao: MessageDao) -> Self {
        Self {
            contact_dao,
            chat_dao,
            message_dao,
        }
    }

    /// 幂等初始化：已有联系人时不做任何事，返回是否实际写入
    pub async fn populate_initial_data(&self) -> Result<bool> {
        let count = self.contact_dao.count().await?;
        if count > 0 {
            info!("[Seed] 已存在 {} 个联系人，跳过初始化", count);
            return Ok(false);
        }
        self.insert_seed_data().await?;
        Ok(true)
    }

    /// 清空所有表后重新写入演示数据
    pub async fn reset(&self) -> Result<()> {
        info!("[Seed] 🧹 重置数据库");
        self.message_dao.delete_all().await?;
        self.chat_dao.delete_all().await?;
        self.contact_dao.delete_all().await?;
        self.insert_seed_data().await
    }

    async fn insert_seed_data(&self) -> Result<()> {
        self.contact_dao.insert(&Contact::self_contact()).await?;

        let contacts = demo_contacts();
        let total = contacts.len() as i64;
        let now = chrono::Utc::now().timestamp_millis();

        for (index, contact) in contacts.iter().enumerate() {
            self.contact_dao.insert(contact).await?;
            let chat_id = self.chat_dao.create_direct_chat(contact.id).await?;

            // 靠后的联系人时间更新，且全部早于当前时间
            let base = now - (total - index as i64) * SEED_SPACING_MS;
            for (offset, text) in SEED_MESSAGES.iter().enumerate() {
                self.message_dao
                    .insert(&Message::new(
                        chat_id,
                        contact.id,
                        *text,
                        None,
                        None,
                        base + offset as i64,
                    ))
                    .await?;
            }
        }

        info!("[Seed] ✅ 写入演示数据：{} 个联系人", contacts.len());
        Ok(())
    }
}
