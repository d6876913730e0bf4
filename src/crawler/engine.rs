// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::crawler::store_guard::StoreGuard;
use crate::crawler::worker::CrawlWorker;
use crate::domain::repositories::catalog_cache::CatalogCache;
use crate::domain::repositories::target_registry::{TargetFilter, TargetRegistry};
use crate::engines::traits::CatalogFetcher;
use anyhow::Result;
use chrono::Utc;
use metrics::{counter, gauge};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};
use tracing::{debug, error, info, warn};

/// 爬取引擎
///
/// 周期性地把到期目标派发给抓取单元。并发由信号量封顶，调度权
/// 通过注册表的条件转换独占获取；存储保护打开期间整轮挂起派发。
/// 每轮开始时顺带巡检缓存，清理已无对应目标的孤儿快照。
pub struct CrawlerEngine<R, C, F>
where
    R: TargetRegistry + Clone + Send + Sync + 'static,
    C: CatalogCache + Clone + Send + Sync + 'static,
    F: CatalogFetcher + Clone + Send + Sync + 'static,
{
    registry: R,
    cache: C,
    worker: CrawlWorker<R, C, F>,
    store_guard: Arc<StoreGuard>,
    permits: Arc<Semaphore>,
    concurrency: usize,
    tick_interval: Duration,
    execution_delay: Duration,
}

impl<R, C, F> Clone for CrawlerEngine<R, C, F>
where
    R: TargetRegistry + Clone + Send + Sync + 'static,
    C: CatalogCache + Clone + Send + Sync + 'static,
    F: CatalogFetcher + Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            cache: self.cache.clone(),
            worker: self.worker.clone(),
            store_guard: self.store_guard.clone(),
            permits: self.permits.clone(),
            concurrency: self.concurrency,
            tick_interval: self.tick_interval,
            execution_delay: self.execution_delay,
        }
    }
}

impl<R, C, F> CrawlerEngine<R, C, F>
where
    R: TargetRegistry + Clone + Send + Sync + 'static,
    C: CatalogCache + Clone + Send + Sync + 'static,
    F: CatalogFetcher + Clone + Send + Sync + 'static,
{
    /// 创建爬取引擎
    ///
    /// # 参数
    ///
    /// * `registry` - 目标注册表
    /// * `cache` - 快照缓存
    /// * `worker` - 抓取单元原型，每次派发克隆一份
    /// * `store_guard` - 存储保护
    /// * `concurrency` - 同时在途的尝试上限
    /// * `tick_interval` - 调度轮询周期
    /// * `execution_delay` - 启动后首轮调度前的延迟
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: R,
        cache: C,
        worker: CrawlWorker<R, C, F>,
        store_guard: Arc<StoreGuard>,
        concurrency: usize,
        tick_interval: Duration,
        execution_delay: Duration,
    ) -> Self {
        Self {
            registry,
            cache,
            worker,
            store_guard,
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            tick_interval,
            execution_delay,
        }
    }

    /// 在途尝试占用的信号量，供关闭流程排空
    pub fn permits(&self) -> Arc<Semaphore> {
        self.permits.clone()
    }

    /// 并发上限
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// 启动调度循环
    ///
    /// # 返回值
    ///
    /// 返回后台任务的句柄
    pub fn start(&self) -> JoinHandle<()> {
        let engine = self.clone();

        tokio::spawn(async move {
            if !engine.execution_delay.is_zero() {
                debug!(
                    "Holding first crawl round for {}s",
                    engine.execution_delay.as_secs()
                );
                sleep(engine.execution_delay).await;
            }

            let mut ticker = interval(engine.tick_interval);
            loop {
                ticker.tick().await;
                if let Err(e) = engine.tick().await {
                    error!("Crawl round failed: {}", e);
                }
            }
        })
    }

    /// 执行一轮调度
    ///
    /// 依次完成：存储保护检查、孤儿快照巡检、到期目标派发。单个
    /// 目标的调度失败不影响同轮的其余目标。
    pub async fn tick(&self) -> Result<()> {
        match self.registry.reset_stuck(chrono::Duration::minutes(30)).await {
            Ok(count) if count > 0 => info!("Reset {} stuck targets", count),
            Ok(_) => {}
            Err(e) => error!("Failed to reset stuck targets: {}", e),
        }

        if self.store_guard.is_open() {
            warn!("Snapshot store suspended, crawl round skipped");
            return Ok(());
        }

        self.prune_orphan_snapshots().await;

        let now = Utc::now();
        let due = self.registry.due(now).await?;
        if due.is_empty() {
            debug!("No targets due");
        }

        let mut dispatched = 0usize;
        for target in due {
            match self.registry.try_schedule(target.id).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    error!("Could not schedule target {}: {}", target.id, e);
                    continue;
                }
            }

            let permit = match self.permits.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    // 并发额度用尽，退还调度权等下一轮
                    if let Err(e) = self.registry.release(target.id).await {
                        error!("Could not release target {}: {}", target.id, e);
                    }
                    counter!("crawl_dispatch_deferred_total").increment(1);
                    debug!("Concurrency saturated, remaining due targets deferred");
                    break;
                }
            };

            let worker = self.worker.clone();
            tokio::spawn(async move {
                let _permit = permit;
                worker.execute(target).await;
            });
            dispatched += 1;
        }

        let inflight = self.concurrency - self.permits.available_permits();
        gauge!("crawl_inflight").set(inflight as f64);
        if dispatched > 0 {
            info!(dispatched, inflight, "Crawl round dispatched");
        }
        Ok(())
    }

    /// 清理已无对应目标的孤儿快照
    ///
    /// 目标被移除时其在途尝试可能已经完成写入；对比缓存持有的
    /// 参与方与注册表的现存目标，删除多出来的快照。
    async fn prune_orphan_snapshots(&self) {
        let cached = match self.cache.participant_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                debug!("Orphan sweep skipped: {}", e);
                return;
            }
        };
        if cached.is_empty() {
            return;
        }

        let registered: HashSet<String> = match self
            .registry
            .list(TargetFilter::default())
            .await
        {
            Ok(targets) => targets.into_iter().map(|t| t.participant_id).collect(),
            Err(e) => {
                debug!("Orphan sweep skipped: {}", e);
                return;
            }
        };

        for participant_id in cached {
            if registered.contains(&participant_id) {
                continue;
            }
            match self.cache.delete(&participant_id).await {
                Ok(()) => {
                    counter!("catalog_orphans_pruned_total").increment(1);
                    info!(participant = %participant_id, "Orphan snapshot removed");
                }
                Err(e) => warn!(
                    participant = %participant_id,
                    "Could not remove orphan snapshot: {}", e
                ),
            }
        }
    }
}
