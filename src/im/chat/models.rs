//! 会话本地模型定义

use crate::im::contact::Contact;
use serde::{Deserialize, Serialize};

/// `chat_with_last_message` 视图的一行；会话没有消息时 last_* 均为 `None`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatWithLastMessage {
    pub id: i64,
    pub last_message_sender_id: Option<i64>,
    pub last_message_text: Option<String>,
    pub last_message_media_uri: Option<String>,
    pub last_message_media_mime_type: Option<String>,
    pub last_message_timestamp: Option<i64>,
}

/// 会话列表条目：会话摘要 + 非本机参与者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDetail {
    pub chat_with_last_message: ChatWithLastMessage,
    pub attendees: Vec<Contact>,
}

impl ChatDetail {
    pub fn id(&self) -> i64 {
        self.chat_with_last_message.id
    }

    /// 单聊的对方联系人
    pub fn first_contact(&self) -> Option<&Contact> {
        self.attendees.first()
    }

    pub fn last_message_timestamp(&self) -> Option<i64> {
        self.chat_with_last_message.last_message_timestamp
    }
}
