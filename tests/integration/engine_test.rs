// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 爬取引擎端到端场景
//!
//! 在内存后端与脚本化抓取端上驱动真实的引擎与抓取单元，验证
//! 变更检测、单目标互斥、失败隔离、退避与存储保护的组合行为。

use super::helpers::{
    catalog_doc, crawl_harness, new_target, snapshot, wait_idle, BlockingFetcher, FetchStep,
    FlakyCache, ScriptedFetcher,
};
use fedcatrs::crawler::StoreGuardConfig;
use fedcatrs::domain::models::outcome::{ContentDelta, CrawlErrorKind};
use fedcatrs::domain::models::target::TargetState;
use fedcatrs::domain::query::OfferQuery;
use fedcatrs::domain::repositories::catalog_cache::CatalogCache;
use fedcatrs::domain::repositories::target_registry::TargetRegistry;
use fedcatrs::infrastructure::repositories::memory_catalog_cache::MemoryCatalogCache;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// 轮询等待条件成立，超时即失败
async fn wait_for<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s: {what}");
}

/// 首抓写入、同内容重抓跳过写入、内容变化后重新写入
#[tokio::test]
async fn change_detection_across_three_crawls() {
    let cache = Arc::new(MemoryCatalogCache::new());
    let fetcher = ScriptedFetcher::new(vec![
        FetchStep::Document(catalog_doc(&["offer-1", "offer-2"])),
        FetchStep::Document(catalog_doc(&["offer-1", "offer-2"])),
        FetchStep::Document(catalog_doc(&["offer-1", "offer-2", "offer-3"])),
    ]);
    let harness = crawl_harness(cache.clone(), fetcher.clone(), StoreGuardConfig::default());

    let target = harness
        .registry
        .add(new_target("https://a.example.com/dsp", "provider-a", 1))
        .await
        .unwrap();

    // 第一抓：快照落库
    harness.engine.tick().await.unwrap();
    let settled = wait_idle(&harness.registry, target.id).await;
    assert!(settled.last_success_at.is_some());
    let first = cache.get("provider-a").await.unwrap().unwrap();
    assert_eq!(first.offers.len(), 2);
    assert_eq!(cache.put_count(), 1);

    // 第二抓：内容相同，跳过写入但记一次成功
    tokio::time::sleep(Duration::from_millis(1100)).await;
    harness.engine.tick().await.unwrap();
    wait_for("second attempt finished", || fetcher.calls() == 2).await;
    let settled = wait_idle(&harness.registry, target.id).await;
    assert!(settled.last_success_at.is_some());
    assert_eq!(settled.consecutive_failures, 0);
    assert_eq!(cache.put_count(), 1);
    let unchanged = cache.get("provider-a").await.unwrap().unwrap();
    assert_eq!(unchanged.content_hash, first.content_hash);

    // 第三抓：内容变化，快照被整体替换
    tokio::time::sleep(Duration::from_millis(1100)).await;
    harness.engine.tick().await.unwrap();
    wait_for("changed snapshot stored", || cache.put_count() == 2).await;
    let replaced = cache.get("provider-a").await.unwrap().unwrap();
    assert_eq!(replaced.offers.len(), 3);
    assert_ne!(replaced.content_hash, first.content_hash);
}

/// 同一目标在途期间不会再被派发
#[tokio::test]
async fn at_most_one_attempt_in_flight_per_target() {
    let cache = Arc::new(MemoryCatalogCache::new());
    let fetcher = BlockingFetcher::new(catalog_doc(&["offer-1"]));
    let harness = crawl_harness(cache.clone(), fetcher.clone(), StoreGuardConfig::default());

    let target = harness
        .registry
        .add(new_target("https://a.example.com/dsp", "provider-a", 1))
        .await
        .unwrap();

    harness.engine.tick().await.unwrap();
    fetcher.wait_started().await;
    assert_eq!(fetcher.calls(), 1);
    let in_flight = harness
        .registry
        .find_by_id(target.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(in_flight.state, TargetState::InFlight);

    // 在途期间连续再调度多轮，不产生第二次抓取
    for _ in 0..3 {
        harness.engine.tick().await.unwrap();
    }
    assert_eq!(fetcher.calls(), 1);

    fetcher.release();
    let settled = wait_idle(&harness.registry, target.id).await;
    assert_eq!(settled.consecutive_failures, 0);
    assert!(cache.get("provider-a").await.unwrap().is_some());
    assert_eq!(fetcher.calls(), 1);
}

/// 抓取失败不触碰既有快照，查询继续服务旧数据
#[tokio::test]
async fn failed_fetch_serves_stale_snapshot() {
    let cache = Arc::new(MemoryCatalogCache::new());
    let fetcher = ScriptedFetcher::new(vec![
        FetchStep::Document(catalog_doc(&["offer-1"])),
        FetchStep::Unreachable,
    ]);
    let harness = crawl_harness(cache.clone(), fetcher.clone(), StoreGuardConfig::default());

    let target = harness
        .registry
        .add(new_target("https://a.example.com/dsp", "provider-a", 1))
        .await
        .unwrap();

    harness.engine.tick().await.unwrap();
    wait_idle(&harness.registry, target.id).await;
    let stored = cache.get("provider-a").await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;
    harness.engine.tick().await.unwrap();
    wait_for("failed attempt recorded", || fetcher.calls() == 2).await;
    let settled = wait_idle(&harness.registry, target.id).await;
    assert_eq!(settled.consecutive_failures, 1);
    assert_eq!(
        cache.get("provider-a").await.unwrap().unwrap().content_hash,
        stored.content_hash
    );
    let offers = cache.query(&OfferQuery::default()).await.unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(cache.put_count(), 1);
}

/// 连续失败达到阈值后，下次可调度时间被推到基准周期之外
#[tokio::test]
async fn repeated_failures_engage_backoff() {
    let cache = Arc::new(MemoryCatalogCache::new());
    let fetcher = ScriptedFetcher::new((0..5).map(|_| FetchStep::Timeout).collect());
    let harness = crawl_harness(cache.clone(), fetcher, StoreGuardConfig::default());

    // 基准周期60秒，退避阈值为3（见装置配置）
    let target = harness
        .registry
        .add(new_target("https://b.example.com/dsp", "provider-b", 60))
        .await
        .unwrap();

    // 逐次驱动五次失败尝试；调度权不看到期时间，测试可以直接拿
    for round in 1..=5i32 {
        assert!(harness.registry.try_schedule(target.id).await.unwrap());
        let scheduled = harness
            .registry
            .find_by_id(target.id)
            .await
            .unwrap()
            .unwrap();
        let before = chrono::Utc::now();
        let outcome = harness.worker.execute(scheduled).await.unwrap();
        assert_eq!(outcome.error, Some(CrawlErrorKind::Timeout));

        let settled = harness
            .registry
            .find_by_id(target.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(settled.consecutive_failures, round);
        let next = settled.next_eligible_at.unwrap();
        if round < 3 {
            // 未达阈值：保持基准周期
            assert!(next <= before + chrono::Duration::seconds(61));
        } else {
            // 达到阈值：严格超出基准周期
            assert!(next > before + chrono::Duration::seconds(60));
        }
    }

    assert!(cache.get("provider-b").await.unwrap().is_none());
    assert_eq!(cache.put_count(), 0);
}

/// 在途期间移除目标：结果作废，孤儿快照在下一轮被清理
#[tokio::test]
async fn removal_discards_result_and_prunes_orphans() {
    let cache = Arc::new(MemoryCatalogCache::new());
    let fetcher = BlockingFetcher::new(catalog_doc(&["offer-1"]));
    let harness = crawl_harness(cache.clone(), fetcher.clone(), StoreGuardConfig::default());

    let target = harness
        .registry
        .add(new_target("https://a.example.com/dsp", "provider-a", 1))
        .await
        .unwrap();

    harness.engine.tick().await.unwrap();
    fetcher.wait_started().await;
    harness.registry.remove(target.id).await.unwrap();
    fetcher.release();

    // 结果作废：没有快照写入
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(cache.get("provider-a").await.unwrap().is_none());
    assert_eq!(cache.put_count(), 0);

    // 已有快照的参与方被移除后，下一轮巡检清掉孤儿
    let orphan = snapshot("provider-gone", vec![("offer-x", json!({}), json!({}))]);
    cache.put(&orphan).await.unwrap();
    harness.engine.tick().await.unwrap();
    assert!(cache.get("provider-gone").await.unwrap().is_none());
}

/// 存储不可用升级为系统性暂停，恢复后探测写入重新放行
#[tokio::test]
async fn store_outage_suspends_dispatch_until_recovery() {
    let cache = Arc::new(FlakyCache::new());
    let fetcher = ScriptedFetcher::new(vec![
        FetchStep::Document(catalog_doc(&["offer-1"])),
        FetchStep::Document(catalog_doc(&["offer-1"])),
    ]);
    let guard_config = StoreGuardConfig {
        failure_threshold: 1,
        recovery_timeout: Duration::from_millis(500),
        failure_window: Duration::from_secs(60),
    };
    let harness = crawl_harness(cache.clone(), fetcher.clone(), guard_config);

    let target = harness
        .registry
        .add(new_target("https://a.example.com/dsp", "provider-a", 1))
        .await
        .unwrap();

    cache.set_fail_puts(true);
    harness.engine.tick().await.unwrap();
    wait_for("guard opened", || harness.guard.stats().is_open).await;
    let settled = wait_idle(&harness.registry, target.id).await;

    // 存储故障不计入目标健康
    assert_eq!(settled.consecutive_failures, 0);
    assert_eq!(fetcher.calls(), 1);

    // 保护打开期间整轮挂起，不再抓取
    harness.engine.tick().await.unwrap();
    assert_eq!(fetcher.calls(), 1);

    // 存储恢复且恢复等待已过：下一轮探测写入成功
    cache.set_fail_puts(false);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    harness.engine.tick().await.unwrap();
    wait_for("probe put stored the snapshot", || cache.put_count() == 1).await;
    assert_eq!(fetcher.calls(), 2);
    assert!(cache.get("provider-a").await.unwrap().is_some());
    assert!(!harness.guard.stats().is_open);
}

/// 成功一次后连续失败计数清零，变更判定回到Unchanged
#[tokio::test]
async fn success_resets_failure_count() {
    let cache = Arc::new(MemoryCatalogCache::new());
    let fetcher = ScriptedFetcher::new(vec![
        FetchStep::Unreachable,
        FetchStep::Unreachable,
        FetchStep::Document(catalog_doc(&["offer-1"])),
        FetchStep::Document(catalog_doc(&["offer-1"])),
    ]);
    let harness = crawl_harness(cache.clone(), fetcher, StoreGuardConfig::default());

    let target = harness
        .registry
        .add(new_target("https://a.example.com/dsp", "provider-a", 60))
        .await
        .unwrap();

    async fn run_once<C, F>(
        harness: &super::helpers::CrawlHarness<C, F>,
        id: uuid::Uuid,
    ) -> fedcatrs::domain::models::outcome::CrawlOutcome
    where
        C: CatalogCache + Clone + Send + Sync + 'static,
        F: fedcatrs::engines::traits::CatalogFetcher + Clone + Send + Sync + 'static,
    {
        assert!(harness.registry.try_schedule(id).await.unwrap());
        let scheduled = harness.registry.find_by_id(id).await.unwrap().unwrap();
        harness.worker.execute(scheduled).await.unwrap()
    }

    run_once(&harness, target.id).await;
    run_once(&harness, target.id).await;
    assert_eq!(
        harness
            .registry
            .find_by_id(target.id)
            .await
            .unwrap()
            .unwrap()
            .consecutive_failures,
        2
    );

    let outcome = run_once(&harness, target.id).await;
    assert_eq!(outcome.delta, Some(ContentDelta::Changed));
    assert_eq!(
        harness
            .registry
            .find_by_id(target.id)
            .await
            .unwrap()
            .unwrap()
            .consecutive_failures,
        0
    );

    let outcome = run_once(&harness, target.id).await;
    assert_eq!(outcome.delta, Some(ContentDelta::Unchanged));
}
