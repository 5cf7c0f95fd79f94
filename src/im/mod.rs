pub mod chat;
pub mod client;
pub mod contact;
pub mod db;
pub mod live;
pub mod message;
pub mod notification;
pub mod repository;
pub mod seed;

// 重新导出仓库与实时查询相关类型
pub use live::{ChangeBus, LiveQuery, Table};
pub use repository::ChatRepository;
