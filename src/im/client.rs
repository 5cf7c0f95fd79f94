//! Socialite 客户端
//!
//! 应用的组装入口：创建连接池、执行迁移、组装变更总线与仓库，并按需写入演示数据。
//! 客户端由调用方持有并按引用传递，不使用全局单例。

use crate::im::db::create_sqlite_pool_with_migration;
use crate::im::live::ChangeBus;
use crate::im::notification::{EmptyNotificationPresenter, NotificationPresenter};
use crate::im::repository::ChatRepository;
use anyhow::Result;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 默认自动回复延迟
pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_secs(5);

/// 客户端配置
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// 本地 SQLite 数据库 URL
    ///
    /// 例如：`sqlite://socialite.db?mode=rwc`，测试中可用 `sqlite::memory:`
    pub db_url: String,
    /// 连接池最大连接数（内存库固定为 1）
    pub max_connections: u32,
    /// 自动回复延迟
    pub reply_delay: Duration,
    /// 连接后是否写入演示数据（幂等）
    pub seed_on_connect: bool,
}

impl ClientConfig {
    /// 创建默认配置
    pub fn new(db_url: impl Into<String>) -> Self {
        Self {
            db_url: db_url.into(),
            max_connections: 5,
            reply_delay: DEFAULT_REPLY_DELAY,
            seed_on_connect: true,
        }
    }

    pub fn with_reply_delay(mut self, reply_delay: Duration) -> Self {
        self.reply_delay = reply_delay;
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_seed_on_connect(mut self, seed_on_connect: bool) -> Self {
        self.seed_on_connect = seed_on_connect;
        self
    }
}

/// Socialite 客户端
pub struct SocialiteClient {
    config: ClientConfig,
    db: Pool<Sqlite>,
    repository: ChatRepository,
}

impl SocialiteClient {
    /// 使用空通知展示器连接
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        Self::connect_with_presenter(config, Arc::new(EmptyNotificationPresenter)).await
    }

    /// 连接数据库并组装仓库
    pub async fn connect_with_presenter(
        config: ClientConfig,
        presenter: Arc<dyn NotificationPresenter>,
    ) -> Result<Self> {
        info!("[Client] 🔗 打开本地数据库: {}", config.db_url);
        let db = create_sqlite_pool_with_migration(&config.db_url, config.max_connections).await?;

        let repository =
            ChatRepository::new(db.clone(), ChangeBus::new(), presenter, config.reply_delay);
        if config.seed_on_connect {
            repository.initialize().await?;
        }

        info!("[Client] ✅ 客户端就绪");
        Ok(Self {
            config,
            db,
            repository,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn repository(&self) -> &ChatRepository {
        &self.repository
    }

    /// 关闭连接池；尚未完成的自动回复会因写入失败而被丢弃
    pub async fn close(self) {
        self.db.close().await;
        info!("[Client] 👋 已关闭");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::im::contact::demo_contacts;
    use std::sync::Once;

    static INIT_LOGGER: Once = Once::new();

    fn init_test_logger() {
        INIT_LOGGER.call_once(|| {
            use tracing_subscriber::prelude::*;
            use tracing_subscriber::EnvFilter;

            let filter_layer = EnvFilter::new("info,socialite_core=debug");
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .with_test_writer();

            // 其他测试可能已安装全局 subscriber，忽略失败
            let _ = tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt_layer)
                .try_init();
        });
    }

    #[test]
    fn default_config_replies_after_five_seconds() {
        let config = ClientConfig::new("sqlite::memory:");
        assert_eq!(config.reply_delay, Duration::from_secs(5));
        assert!(config.seed_on_connect);

        let config = config
            .with_reply_delay(Duration::from_millis(10))
            .with_seed_on_connect(false)
            .with_max_connections(2);
        assert_eq!(config.reply_delay, Duration::from_millis(10));
        assert!(!config.seed_on_connect);
        assert_eq!(config.max_connections, 2);
    }

    #[tokio::test]
    async fn connect_seeds_by_default() -> Result<()> {
        init_test_logger();
        let client = SocialiteClient::connect(ClientConfig::new("sqlite::memory:")).await?;
        let chats = client.repository().get_chats().await?.current();
        assert_eq!(chats.len(), demo_contacts().len());
        client.close().await;
        Ok(())
    }

    #[tokio::test]
    async fn connect_without_seed_leaves_database_empty() -> Result<()> {
        init_test_logger();
        let config = ClientConfig::new("sqlite::memory:").with_seed_on_connect(false);
        let client = SocialiteClient::connect(config).await?;
        assert!(client.repository().get_chats().await?.current().is_empty());

        client.repository().initialize().await?;
        assert_eq!(
            client.repository().get_contacts().await?.current().len(),
            demo_contacts().len()
        );
        Ok(())
    }
}
