//! 消息本地模型定义

use crate::im::contact::SELF_CONTACT_ID;
use serde::{Deserialize, Serialize};

/// 本地消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// 自增 ID，插入前为 0
    pub id: i64,
    pub chat_id: i64,
    /// 发送者联系人 ID，0 表示本机用户发出
    pub sender_id: i64,
    pub text: String,
    pub media_uri: Option<String>,
    pub media_mime_type: Option<String>,
    /// 毫秒时间戳
    pub timestamp: i64,
}

impl Message {
    /// 构造一条待插入的消息
    pub fn new(
        chat_id: i64,
        sender_id: i64,
        text: impl Into<String>,
        media_uri: Option<String>,
        media_mime_type: Option<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: 0,
            chat_id,
            sender_id,
            text: text.into(),
            media_uri,
            media_mime_type,
            timestamp,
        }
    }

    /// 是否为本机用户发出的消息
    pub fn is_outgoing(&self) -> bool {
        self.sender_id == SELF_CONTACT_ID
    }
}
