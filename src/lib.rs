pub mod im;

// 重新导出常用类型，方便外部使用
pub use im::{
    chat::{ChatDetail, ChatWithLastMessage},
    client::{ClientConfig, SocialiteClient},
    contact::Contact,
    message::Message,
    notification::{EmptyNotificationPresenter, NotificationPresenter},
    ChatRepository, LiveQuery,
};
