//! 响应式查询
//!
//! 写操作提交后通过 [`ChangeBus`] 广播被修改的表名；[`LiveQuery`] 在后台任务中
//! 订阅总线，依赖表发生变化时重新执行查询，并通过 `watch` 通道发布新快照。
//!
//! 语义：
//! - 创建时立即得到当前快照；
//! - 快照按提交顺序发布，但订阅方只保证能看到最新的一份（中间状态可能被合并）；
//! - 与上一份快照相同的结果不会重复发布。

use anyhow::Result;
use futures_util::stream::{self, Stream};
use std::future::Future;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 可被订阅的表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Contacts,
    Chats,
    ChatAttendees,
    Messages,
}

/// 表变更通知总线
#[derive(Clone, Debug)]
pub struct ChangeBus {
    tx: broadcast::Sender<Table>,
}

impl ChangeBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// 写操作提交后调用，通知所有订阅者
    pub fn notify(&self, tables: &[Table]) {
        for table in tables {
            // 没有订阅者时 send 返回 Err，属正常情况
            let _ = self.tx.send(*table);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Table> {
        self.tx.subscribe()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

/// 实时查询句柄，drop 时停止后台刷新任务
pub struct LiveQuery<T> {
    rx: watch::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T> LiveQuery<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// 执行首次查询并启动后台刷新任务
    ///
    /// - `deps`: 查询依赖的表，只有这些表的变更才会触发重新查询
    /// - `query`: 每次刷新时调用的查询闭包
    pub async fn spawn<F, Fut>(bus: &ChangeBus, deps: &'static [Table], query: F) -> Result<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        // 先订阅再查询，保证首个快照之后的提交一定能收到通知
        let mut changes = bus.subscribe();
        let initial = query().await?;
        let (tx, rx) = watch::channel(initial);

        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(table) if !deps.contains(&table) => continue,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("[LiveQuery] 通知积压，跳过 {} 条，直接刷新", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }

                // 合并已积压的通知，只刷新一次
                let mut closed = false;
                loop {
                    match changes.try_recv() {
                        Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Closed) => {
                            closed = true;
                            break;
                        }
                    }
                }

                match query().await {
                    Ok(snapshot) => {
                        tx.send_if_modified(|current| {
                            if *current == snapshot {
                                false
                            } else {
                                *current = snapshot;
                                true
                            }
                        });
                    }
                    Err(e) => warn!("[LiveQuery] 刷新查询失败，保留上一份快照: {:#}", e),
                }

                if closed || tx.is_closed() {
                    break;
                }
            }
            debug!("[LiveQuery] 刷新任务结束");
        });

        Ok(Self { rx, task })
    }

    /// 当前最新快照
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// 等待下一份（与当前不同的）快照；后台任务结束时返回 `None`
    pub async fn next_snapshot(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// 等待直到快照满足条件（当前快照满足时立即返回）
    pub async fn wait_until<P>(&mut self, mut pred: P) -> Option<T>
    where
        P: FnMut(&T) -> bool,
    {
        self.rx
            .wait_for(|value| pred(value))
            .await
            .ok()
            .map(|value| value.clone())
    }

    /// 转为流：先产出当前快照，之后每次变化产出一份新快照
    pub fn into_stream(self) -> impl Stream<Item = T> + Send + 'static {
        stream::unfold((self, true), |(mut live, first)| async move {
            if first {
                let snapshot = live.rx.borrow_and_update().clone();
                return Some((snapshot, (live, false)));
            }
            let snapshot = live.next_snapshot().await?;
            Some((snapshot, (live, false)))
        })
    }
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn counter_query(
        counter: Arc<AtomicI64>,
    ) -> impl Fn() -> std::future::Ready<Result<i64>> + Send + Sync + 'static {
        move || std::future::ready(Ok(counter.load(Ordering::SeqCst)))
    }

    #[tokio::test]
    async fn yields_initial_snapshot_immediately() -> Result<()> {
        let bus = ChangeBus::new();
        let counter = Arc::new(AtomicI64::new(7));
        let live = LiveQuery::spawn(&bus, &[Table::Messages], counter_query(counter)).await?;
        assert_eq!(live.current(), 7);
        Ok(())
    }

    #[tokio::test]
    async fn refreshes_on_dependency_change() -> Result<()> {
        let bus = ChangeBus::new();
        let counter = Arc::new(AtomicI64::new(0));
        let mut live =
            LiveQuery::spawn(&bus, &[Table::Messages], counter_query(counter.clone())).await?;

        counter.store(3, Ordering::SeqCst);
        bus.notify(&[Table::Messages]);

        let next = timeout(Duration::from_secs(2), live.next_snapshot()).await?;
        assert_eq!(next, Some(3));
        Ok(())
    }

    #[tokio::test]
    async fn ignores_unrelated_tables() -> Result<()> {
        let bus = ChangeBus::new();
        let counter = Arc::new(AtomicI64::new(0));
        let mut live =
            LiveQuery::spawn(&bus, &[Table::Messages], counter_query(counter.clone())).await?;

        counter.store(1, Ordering::SeqCst);
        bus.notify(&[Table::Contacts]);

        let res = timeout(Duration::from_millis(200), live.next_snapshot()).await;
        assert!(res.is_err(), "无关表变更不应触发刷新");
        assert_eq!(live.current(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn identical_snapshots_are_not_republished() -> Result<()> {
        let bus = ChangeBus::new();
        let counter = Arc::new(AtomicI64::new(5));
        let mut live =
            LiveQuery::spawn(&bus, &[Table::Chats], counter_query(counter.clone())).await?;

        bus.notify(&[Table::Chats]);
        let res = timeout(Duration::from_millis(200), live.next_snapshot()).await;
        assert!(res.is_err(), "相同快照不应重复发布");

        counter.store(6, Ordering::SeqCst);
        bus.notify(&[Table::Chats]);
        let next = timeout(Duration::from_secs(2), live.next_snapshot()).await?;
        assert_eq!(next, Some(6));
        Ok(())
    }

    #[tokio::test]
    async fn stream_starts_with_current_snapshot() -> Result<()> {
        let bus = ChangeBus::new();
        let counter = Arc::new(AtomicI64::new(1));
        let live =
            LiveQuery::spawn(&bus, &[Table::Messages], counter_query(counter.clone())).await?;
        let mut stream = Box::pin(live.into_stream());

        assert_eq!(stream.next().await, Some(1));

        counter.store(2, Ordering::SeqCst);
        bus.notify(&[Table::Messages]);
        let next = timeout(Duration::from_secs(2), stream.next()).await?;
        assert_eq!(next, Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn wait_until_resolves_on_matching_snapshot() -> Result<()> {
        let bus = ChangeBus::new();
        let counter = Arc::new(AtomicI64::new(0));
        let mut live =
            LiveQuery::spawn(&bus, &[Table::Messages], counter_query(counter.clone())).await?;

        let writer_bus = bus.clone();
        let writer_counter = counter.clone();
        tokio::spawn(async move {
            for i in 1..=5 {
                writer_counter.store(i, Ordering::SeqCst);
                writer_bus.notify(&[Table::Messages]);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });

        let reached = timeout(Duration::from_secs(2), live.wait_until(|v| *v == 5)).await?;
        assert_eq!(reached, Some(5));
        Ok(())
    }
}
