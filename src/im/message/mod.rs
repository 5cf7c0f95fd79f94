//! 消息模块
//!
//! 消息只会新增（发送或自动回复），不会被编辑；重置时整体清空

pub mod dao;
pub mod models;

// 重新导出主要类型
pub use dao::MessageDao;
pub use models::Message;
