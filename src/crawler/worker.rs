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

use crate::crawler::backoff::BackoffPolicy;
use crate::crawler::store_guard::StoreGuard;
use crate::domain::models::outcome::{ContentDelta, CrawlErrorKind, CrawlOutcome};
use crate::domain::models::target::CrawlTarget;
use crate::domain::repositories::catalog_cache::CatalogCache;
use crate::domain::repositories::target_registry::TargetRegistry;
use crate::domain::services::normalizer::{CatalogNormalizer, NormalizeError};
use crate::engines::traits::CatalogFetcher;
use chrono::Utc;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// 抓取单元
///
/// 执行单个目标的一次完整抓取尝试：抓取、规整、变更检测、受保护
/// 的存储写入，最后向注册表提交结论。每次尝试克隆一个实例并在
/// 独立任务中运行。
pub struct CrawlWorker<R, C, F>
where
    R: TargetRegistry + Clone,
    C: CatalogCache + Clone,
    F: CatalogFetcher + Clone,
{
    registry: R,
    cache: C,
    fetcher: F,
    store_guard: Arc<StoreGuard>,
    backoff: BackoffPolicy,
    attempt_timeout: Duration,
}

impl<R, C, F> Clone for CrawlWorker<R, C, F>
where
    R: TargetRegistry + Clone,
    C: CatalogCache + Clone,
    F: CatalogFetcher + Clone,
{
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            cache: self.cache.clone(),
            fetcher: self.fetcher.clone(),
            store_guard: self.store_guard.clone(),
            backoff: self.backoff.clone(),
            attempt_timeout: self.attempt_timeout,
        }
    }
}

impl<R, C, F> CrawlWorker<R, C, F>
where
    R: TargetRegistry + Clone,
    C: CatalogCache + Clone,
    F: CatalogFetcher + Clone,
{
    /// 创建新的抓取单元
    pub fn new(
        registry: R,
        cache: C,
        fetcher: F,
        store_guard: Arc<StoreGuard>,
        backoff: BackoffPolicy,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            cache,
            fetcher,
            store_guard,
            backoff,
            attempt_timeout,
        }
    }

    /// 执行一次抓取尝试
    ///
    /// 目标必须已处于Scheduled状态。尝试结束时提交结论并把目标
    /// 落回Idle；目标在尝试期间被移除时结论整体作废，返回None。
    #[instrument(skip(self, target), fields(target_id = %target.id, participant = %target.participant_id, url = %target.url))]
    pub async fn execute(&self, target: CrawlTarget) -> Option<CrawlOutcome> {
        let started_at = Utc::now();
        if let Err(e) = self.registry.mark_in_flight(target.id, started_at).await {
            warn!("Unable to start crawl attempt: {}", e);
            return None;
        }

        let clock = Instant::now();
        let result = self.run_attempt(&target).await;
        let duration_ms = clock.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(None) => {
                info!("Target removed mid-attempt, result discarded");
                return None;
            }
            Ok(Some(delta)) => CrawlOutcome::succeeded(
                target.id,
                target.participant_id.clone(),
                delta,
                duration_ms,
            ),
            Err(kind) => CrawlOutcome::failed(
                target.id,
                target.participant_id.clone(),
                kind,
                duration_ms,
            ),
        };

        self.settle(&target, outcome).await
    }

    /// 运行抓取、规整与存储写入
    ///
    /// `Ok(None)`表示目标已被移除、结论作废。
    async fn run_attempt(&self, target: &CrawlTarget) -> Result<Option<ContentDelta>, CrawlErrorKind> {
        let raw = match timeout(self.attempt_timeout, self.fetcher.fetch(target)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!("Catalog fetch failed: {}", e);
                return Err(e.kind());
            }
            Err(_) => {
                warn!(
                    "Crawl attempt exceeded {}s, in-flight request dropped",
                    self.attempt_timeout.as_secs()
                );
                return Err(CrawlErrorKind::Timeout);
            }
        };

        let snapshot = match CatalogNormalizer::normalize(&raw, &target.participant_id, Utc::now())
        {
            Ok(snapshot) => snapshot,
            Err(NormalizeError::MalformedCatalog(reason)) => {
                warn!("Catalog rejected: {}", reason);
                return Err(CrawlErrorKind::MalformedCatalog);
            }
            Err(NormalizeError::UnsupportedProtocolVersion(version)) => {
                warn!("Catalog rejected, unsupported protocol version: {}", version);
                return Err(CrawlErrorKind::UnsupportedProtocolVersion);
            }
        };

        let previous_hash = match self.cache.get(&target.participant_id).await {
            Ok(previous) => previous.map(|s| s.content_hash),
            Err(e) => {
                warn!("Could not read previous snapshot: {}", e);
                None
            }
        };
        if previous_hash.as_deref() == Some(snapshot.content_hash.as_str()) {
            debug!(content_hash = %snapshot.content_hash, "Catalog unchanged, store write skipped");
            return Ok(Some(ContentDelta::Unchanged));
        }

        if !self.store_guard.allows_put() {
            warn!("Snapshot store suspended, write withheld");
            return Err(CrawlErrorKind::StoreUnavailable);
        }

        // 移除与抓取竞争：写入前确认目标仍然注册
        match self.registry.find_by_id(target.id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Ok(None),
            Err(e) => {
                // 注册表暂时答不上来就照常写入，孤儿快照由巡检清理
                error!("Registry lookup failed before store write: {}", e);
            }
        }

        match self.cache.put(&snapshot).await {
            Ok(()) => {
                self.store_guard.record_success();
                info!(
                    offers = snapshot.offers.len(),
                    content_hash = %snapshot.content_hash,
                    "Catalog snapshot replaced"
                );
                Ok(Some(ContentDelta::Changed))
            }
            Err(e) => {
                self.store_guard.record_failure();
                warn!("Snapshot store write failed: {}", e);
                Err(CrawlErrorKind::StoreUnavailable)
            }
        }
    }

    /// 提交结论并完成健康记账
    async fn settle(&self, target: &CrawlTarget, outcome: CrawlOutcome) -> Option<CrawlOutcome> {
        let failures_after = if outcome.success {
            0
        } else if outcome.counts_against_target() {
            target.consecutive_failures as u32 + 1
        } else {
            target.consecutive_failures as u32
        };
        let base_interval = Duration::from_secs(target.interval_secs.max(1) as u64);
        let next_eligible = self
            .backoff
            .next_eligible_at(failures_after, base_interval, Utc::now());

        if let Err(e) = self
            .registry
            .record_outcome(target.id, &outcome, next_eligible)
            .await
        {
            error!("Failed to record crawl outcome: {}", e);
        }

        let result_label = match outcome.error {
            None => "success".to_string(),
            Some(kind) => kind.to_string(),
        };
        counter!("crawl_attempts_total", "result" => result_label).increment(1);
        histogram!("crawl_duration_seconds").record(outcome.duration_ms as f64 / 1000.0);
        if outcome.delta == Some(ContentDelta::Changed) {
            counter!("catalog_changes_total").increment(1);
        }

        match outcome.error {
            None => info!(
                delta = ?outcome.delta,
                duration_ms = outcome.duration_ms,
                "Crawl attempt finished"
            ),
            Some(kind) => warn!(
                error = %kind,
                failures = failures_after,
                next_eligible = %next_eligible,
                "Crawl attempt failed"
            ),
        }

        Some(outcome)
    }
}
