//! 联系人模块
//!
//! 联系人在首次启动时写入，之后只读；id = 0 为本机用户

pub mod dao;
pub mod models;

// 重新导出主要类型
pub use dao::ContactDao;
pub use models::{demo_contacts, Contact, SELF_CONTACT_ID};
