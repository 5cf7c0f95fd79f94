//! Socialite CLI 客户端
//!
//! 非交互式 CLI，用于查看会话、发送消息并观察自动回复

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use socialite_core::{ClientConfig, Contact, Message, NotificationPresenter, SocialiteClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Socialite CLI 客户端
#[derive(Parser, Debug)]
#[command(name = "socialite-cli")]
#[command(about = "Socialite CLI - 本地会话仓库演示", long_about = None)]
struct Args {
    /// 数据库 URL
    #[arg(long, default_value = "sqlite://socialite.db?mode=rwc")]
    db: String,

    /// 自动回复延迟（毫秒）
    #[arg(long, default_value = "5000")]
    reply_delay_ms: u64,

    /// 日志级别（默认: info,socialite_core=debug）
    #[arg(long, default_value = "info,socialite_core=debug")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 打印会话列表
    Chats,
    /// 打印会话消息
    Messages { chat_id: i64 },
    /// 发送消息并等待自动回复
    Send {
        chat_id: i64,
        text: String,
        #[arg(long)]
        media_uri: Option<String>,
        #[arg(long)]
        mime_type: Option<String>,
    },
    /// 持续输出会话列表变化
    Watch {
        /// 运行时长（秒）
        #[arg(short, long, default_value = "30")]
        seconds: u64,
    },
    /// 清空并重新写入演示数据
    Reset,
}

/// 初始化日志
fn init_logger(log_level: &str) {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    // 优先使用环境变量 RUST_LOG（如果设置了），否则使用命令行参数
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // JSON 输出走 stdout，日志走 stderr
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

/// 把通知输出到日志
struct LogPresenter;

#[async_trait]
impl NotificationPresenter for LogPresenter {
    async fn show_notification(
        &self,
        contact: &Contact,
        messages: &[Message],
        from_user: bool,
        update: bool,
    ) {
        let latest = messages.first().map(|m| m.text.as_str()).unwrap_or("");
        info!(
            "[CLI/Notify] 🔔 {} (from_user={}, update={}): {}",
            contact.name, from_user, update, latest
        );
    }

    async fn can_bubble(&self, _contact: &Contact) -> bool {
        false
    }

    async fn dismiss_notification(&self, chat_id: i64) {
        info!("[CLI/Notify] 🔕 移除会话 {} 的通知", chat_id);
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level);

    let reply_delay = Duration::from_millis(args.reply_delay_ms);
    let config = ClientConfig::new(args.db.clone()).with_reply_delay(reply_delay);
    let client = SocialiteClient::connect_with_presenter(config, Arc::new(LogPresenter)).await?;
    let repo = client.repository();

    match args.command {
        Command::Chats => {
            print_json(&repo.get_chats().await?.current())?;
        }
        Command::Messages { chat_id } => {
            print_json(&repo.find_messages(chat_id).await?.current())?;
        }
        Command::Send {
            chat_id,
            text,
            media_uri,
            mime_type,
        } => {
            match repo.send_message(chat_id, &text, media_uri, mime_type).await? {
                Some(id) => {
                    info!("[CLI] 📤 已发送消息 {}，等待自动回复...", id);
                    tokio::time::sleep(reply_delay + Duration::from_millis(500)).await;
                    print_json(&repo.find_messages(chat_id).await?.current())?;
                }
                None => info!("[CLI] 会话 {} 不存在", chat_id),
            }
        }
        Command::Watch { seconds } => {
            let mut chats = Box::pin(repo.get_chats().await?.into_stream());
            let deadline = tokio::time::sleep(Duration::from_secs(seconds));
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    next = chats.next() => match next {
                        Some(snapshot) => print_json(&snapshot)?,
                        None => break,
                    },
                }
            }
        }
        Command::Reset => {
            repo.reset().await?;
            info!("[CLI] ✅ 已重置");
        }
    }

    client.close().await;
    Ok(())
}
