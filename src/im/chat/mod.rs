//! 会话模块
//!
//! 目前只创建单聊：每个会话恰好一个非本机参与者

pub mod dao;
pub mod models;

// 重新导出主要类型
pub use dao::ChatDao;
pub use models::{ChatDetail, ChatWithLastMessage};
