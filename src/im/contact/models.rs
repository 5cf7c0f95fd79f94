//! 联系人本地模型定义

use serde::{Deserialize, Serialize};

/// 本机用户的联系人 ID
pub const SELF_CONTACT_ID: i64 = 0;

/// 复读型回复模型：把对方发来的文本原样发回
const REPLY_MODEL_ECHO: &str = "say";

/// 联系人
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub icon: String,
    /// 自动回复模型：`say` 表示复读，其它值直接作为回复文本
    pub reply_model: String,
}

impl Contact {
    pub fn new(id: i64, name: &str, icon: &str, reply_model: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            icon: icon.to_string(),
            reply_model: reply_model.to_string(),
        }
    }

    /// 本机用户
    pub fn self_contact() -> Self {
        Self::new(SELF_CONTACT_ID, "You", "you.jpg", "")
    }

    pub fn is_self(&self) -> bool {
        self.id == SELF_CONTACT_ID
    }

    /// 根据对方发来的文本生成自动回复
    pub fn build_reply_message(&self, text: &str) -> String {
        if self.reply_model == REPLY_MODEL_ECHO {
            text.to_string()
        } else {
            self.reply_model.clone()
        }
    }
}

/// 演示用联系人（不含本机用户）
pub fn demo_contacts() -> Vec<Contact> {
    vec![
        Contact::new(1, "Cat", "cat.jpg", "Meow"),
        Contact::new(2, "Dog", "dog.jpg", "Woof woof!!"),
        Contact::new(3, "Parrot", "parrot.jpg", REPLY_MODEL_ECHO),
        Contact::new(4, "Sheep", "sheep.jpg", "Baa"),
        Contact::new(5, "Koala", "koala.jpg", "Zzz…"),
        Contact::new(6, "Tiger", "tiger.jpg", "Roar!"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canned_reply_ignores_text() {
        let cat = Contact::new(1, "Cat", "cat.jpg", "Meow");
        assert_eq!(cat.build_reply_message("hello"), "Meow");
        assert_eq!(cat.build_reply_message(""), "Meow");
    }

    #[test]
    fn echo_reply_repeats_text() {
        let parrot = Contact::new(3, "Parrot", "parrot.jpg", "say");
        assert_eq!(parrot.build_reply_message("Polly?"), "Polly?");
    }

    #[test]
    fn demo_contacts_never_use_self_id() {
        let contacts = demo_contacts();
        assert!(!contacts.is_empty());
        assert!(contacts.iter().all(|c| !c.is_self()));
        let mut ids: Vec<i64> = contacts.iter().map(|c| c.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), contacts.len());
    }
}
