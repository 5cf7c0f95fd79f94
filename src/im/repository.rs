//! 会话仓库
//!
//! 会话与消息读写的唯一入口，负责：
//! - 转发实时查询给 UI 层；
//! - 发送消息后触发通知，并在固定延迟后模拟对方自动回复；
//! - 记录当前前台会话，用于抑制该会话的新消息通知。

use crate::im::chat::{ChatDao, ChatDetail};
use crate::im::contact::{Contact, ContactDao, SELF_CONTACT_ID};
use crate::im::live::{ChangeBus, LiveQuery};
use crate::im::message::{Message, MessageDao};
use crate::im::notification::NotificationPresenter;
use crate::im::seed::Seeder;
use anyhow::Result;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 会话仓库
#[derive(Clone)]
pub struct ChatRepository {
    contact_dao: ContactDao,
    chat_dao: ChatDao,
    message_dao: MessageDao,
    seeder: Seeder,
    presenter: Arc<dyn NotificationPresenter>,
    /// 当前前台会话；自动回复完成时只读取一次快照
    active_chat: Arc<Mutex<Option<i64>>>,
    reply_delay: Duration,
}

impl ChatRepository {
    /// 基于共享连接池创建仓库
    pub fn new(
        db: Pool<Sqlite>,
        bus: ChangeBus,
        presenter: Arc<dyn NotificationPresenter>,
        reply_delay: Duration,
    ) -> Self {
        let contact_dao = ContactDao::new(db.clone(), bus.clone());
        let chat_dao = ChatDao::new(db.clone(), bus.clone());
        let message_dao = MessageDao::new(db, bus);
        let seeder = Seeder::new(contact_dao.clone(), chat_dao.clone(), message_dao.clone());
        Self {
            contact_dao,
            chat_dao,
            message_dao,
            seeder,
            presenter,
            active_chat: Arc::new(Mutex::new(None)),
            reply_delay,
        }
    }

    /// 首次启动写入演示数据（幂等）
    pub async fn initialize(&self) -> Result<()> {
        self.seeder.populate_initial_data().await?;
        Ok(())
    }

    /// 清空所有表并重新写入演示数据
    pub async fn reset(&self) -> Result<()> {
        self.seeder.reset().await
    }

    /// 实时会话列表（按最新消息时间倒序）
    pub async fn get_chats(&self) -> Result<LiveQuery<Vec<ChatDetail>>> {
        self.chat_dao.observe_all_details().await
    }

    /// 实时单个会话
    pub async fn find_chat(&self, chat_id: i64) -> Result<LiveQuery<Option<ChatDetail>>> {
        self.chat_dao.observe_detail_by_id(chat_id).await
    }

    /// 实时会话消息（按时间倒序）
    pub async fn find_messages(&self, chat_id: i64) -> Result<LiveQuery<Vec<Message>>> {
        self.message_dao.observe_all(chat_id).await
    }

    /// 实时联系人列表（不含本机用户）
    pub async fn get_contacts(&self) -> Result<LiveQuery<Vec<Contact>>> {
        self.contact_dao.observe_all().await
    }

    pub async fn find_contact(&self, contact_id: i64) -> Result<Option<Contact>> {
        self.contact_dao.find_by_id(contact_id).await
    }

    /// 发送消息
    ///
    /// 会话不存在时静默返回 `Ok(None)`；否则写入消息、触发通知，
    /// 并在后台安排一次延迟自动回复，返回新消息 ID。
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        media_uri: Option<String>,
        media_mime_type: Option<String>,
    ) -> Result<Option<i64>> {
        let Some(contact) = self.load_chat_contact(chat_id).await? else {
            return Ok(None);
        };

        let now = chrono::Utc::now().timestamp_millis();
        let message_id = self
            .message_dao
            .insert(&Message::new(
                chat_id,
                SELF_CONTACT_ID,
                text,
                media_uri,
                media_mime_type,
                now,
            ))
            .await?;
        info!(
            "[ChatRepo] 📤 发送消息 id={} 到会话 {} ({})",
            message_id, chat_id, contact.name
        );

        let messages = self.message_dao.load_all(chat_id).await?;
        self.presenter
            .show_notification(&contact, &messages, true, false)
            .await;

        self.schedule_reply(chat_id, contact, text.to_string());
        Ok(Some(message_id))
    }

    /// 标记会话进入前台；联系人不支持气泡时同时移除其通知
    pub async fn activate_chat(&self, chat_id: i64) -> Result<()> {
        *self.active_chat.lock().await = Some(chat_id);
        debug!("[ChatRepo] 会话 {} 进入前台", chat_id);

        let Some(contact) = self.load_chat_contact(chat_id).await? else {
            return Ok(());
        };
        if !self.presenter.can_bubble(&contact).await {
            self.presenter.dismiss_notification(chat_id).await;
        }
        Ok(())
    }

    /// 标记会话离开前台；`chat_id` 不是当前会话时不做任何事
    pub async fn deactivate_chat(&self, chat_id: i64) {
        let mut active = self.active_chat.lock().await;
        if *active == Some(chat_id) {
            *active = None;
            debug!("[ChatRepo] 会话 {} 离开前台", chat_id);
        }
    }

    /// 当前前台会话
    pub async fn active_chat(&self) -> Option<i64> {
        *self.active_chat.lock().await
    }

    /// 用最新消息刷新会话通知（例如用户在通知里直接回复后）
    pub async fn update_notification(&self, chat_id: i64) -> Result<()> {
        let Some(contact) = self.load_chat_contact(chat_id).await? else {
            return Ok(());
        };
        let messages = self.message_dao.load_all(chat_id).await?;
        self.presenter
            .show_notification(&contact, &messages, false, true)
            .await;
        Ok(())
    }

    /// 清空所有消息
    pub async fn clear_messages(&self) -> Result<()> {
        self.message_dao.delete_all().await?;
        Ok(())
    }

    /// 查询单聊的对方联系人；会话不存在时返回 `None`
    async fn load_chat_contact(&self, chat_id: i64) -> Result<Option<Contact>> {
        let Some(detail) = self.chat_dao.load_detail_by_id(chat_id).await? else {
            debug!("[ChatRepo] 会话 {} 不存在，忽略", chat_id);
            return Ok(None);
        };
        let contact = detail.first_contact().cloned();
        if contact.is_none() {
            warn!("[ChatRepo] 会话 {} 没有参与者，忽略", chat_id);
        }
        Ok(contact)
    }

    /// 后台延迟自动回复；不与调用方关联，进程退出时直接丢弃
    fn schedule_reply(&self, chat_id: i64, contact: Contact, text: String) {
        let repo = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(repo.reply_delay).await;
            if let Err(e) = repo.deliver_reply(chat_id, &contact, &text).await {
                warn!("[ChatRepo] 自动回复失败，已忽略: chat_id={}, {:#}", chat_id, e);
            }
        });
    }

    async fn deliver_reply(&self, chat_id: i64, contact: &Contact, text: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let reply = contact.build_reply_message(text);
        let message_id = self
            .message_dao
            .insert(&Message::new(chat_id, contact.id, reply, None, None, now))
            .await?;
        info!(
            "[ChatRepo] 📨 {} 自动回复 id={} 到会话 {}",
            contact.name, message_id, chat_id
        );

        let active = *self.active_chat.lock().await;
        if active == Some(chat_id) {
            debug!("[ChatRepo] 会话 {} 处于前台，不弹通知", chat_id);
            return Ok(());
        }

        let messages = self.message_dao.load_all(chat_id).await?;
        self.presenter
            .show_notification(contact, &messages, false, false)
            .await;
        Ok(())
    }
}
