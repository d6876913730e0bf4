// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::crawler::engine::CrawlerEngine;
use crate::domain::repositories::catalog_cache::CatalogCache;
use crate::domain::repositories::target_registry::TargetRegistry;
use crate::engines::traits::CatalogFetcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// 爬取管理器
///
/// 持有引擎的调度循环句柄并负责优雅关闭：收到信号后先停下派发，
/// 再在宽限期内等待在途尝试排空。
pub struct CrawlerManager {
    handle: Option<JoinHandle<()>>,
    permits: Arc<Semaphore>,
    concurrency: usize,
    shutdown_grace: Duration,
}

impl CrawlerManager {
    /// 启动引擎并接管其生命周期
    ///
    /// # 参数
    ///
    /// * `engine` - 已装配好的爬取引擎
    /// * `shutdown_grace` - 关闭时等待在途尝试的宽限期
    pub fn start<R, C, F>(engine: &CrawlerEngine<R, C, F>, shutdown_grace: Duration) -> Self
    where
        R: TargetRegistry + Clone + Send + Sync + 'static,
        C: CatalogCache + Clone + Send + Sync + 'static,
        F: CatalogFetcher + Clone + Send + Sync + 'static,
    {
        let handle = engine.start();
        info!("Crawler engine started");

        Self {
            handle: Some(handle),
            permits: engine.permits(),
            concurrency: engine.concurrency(),
            shutdown_grace,
        }
    }

    /// 等待关闭信号并优雅关闭
    pub async fn wait_for_shutdown(&mut self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }

        self.shutdown().await;
    }

    /// 停止派发并排空在途尝试
    ///
    /// 宽限期结束时仍未返回的尝试被放弃，其滞留的调度状态之后由
    /// 注册表的滞留复位回收。
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        info!("Dispatch stopped, draining in-flight attempts...");

        let drained = timeout(
            self.shutdown_grace,
            self.permits.clone().acquire_many_owned(self.concurrency as u32),
        )
        .await;

        match drained {
            Ok(Ok(_)) => info!("All in-flight attempts drained"),
            Ok(Err(_)) => warn!("Attempt semaphore closed during drain"),
            Err(_) => warn!(
                "Shutdown grace of {}s elapsed with attempts still in flight",
                self.shutdown_grace.as_secs()
            ),
        }
    }
}
