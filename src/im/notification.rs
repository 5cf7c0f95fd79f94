//! 通知展示回调接口
//!
//! 仓库在写入消息后通过该接口触发通知，具体的展示、气泡、快捷方式由调用方实现。

use crate::im::contact::Contact;
use crate::im::message::Message;
use async_trait::async_trait;

/// 通知展示器
#[async_trait]
pub trait NotificationPresenter: Send + Sync {
    /// 展示（或刷新）某个联系人的会话通知
    ///
    /// - `messages`: 会话最新的消息列表（时间倒序）
    /// - `from_user`: 是否由本机用户发出触发（仅用于更新快捷方式/气泡状态）
    /// - `update`: 是否为对已有通知的刷新
    async fn show_notification(
        &self,
        contact: &Contact,
        messages: &[Message],
        from_user: bool,
        update: bool,
    );

    /// 该联系人的会话能否以气泡形式展示
    async fn can_bubble(&self, contact: &Contact) -> bool;

    /// 移除会话通知
    async fn dismiss_notification(&self, chat_id: i64);
}

/// 空实现（默认展示器）
pub struct EmptyNotificationPresenter;

#[async_trait]
impl NotificationPresenter for EmptyNotificationPresenter {
    async fn show_notification(
        &self,
        _contact: &Contact,
        _messages: &[Message],
        _from_user: bool,
        _update: bool,
    ) {
    }

    async fn can_bubble(&self, _contact: &Contact) -> bool {
        false
    }

    async fn dismiss_notification(&self, _chat_id: i64) {}
}
