// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 目录缓存契约套件
//!
//! 同一组断言跑在内存、SQL与Redis三个实现上：整体替换写入、
//! 读写一致、幂等删除、跨参与方查询与索引维护。查询评估在进程
//! 内统一执行，三个后端对同一查询必须命中相同条目。

use super::helpers::{snapshot, sqlite_db};
use fedcatrs::domain::query::{Criterion, CriterionOp, OfferQuery, SortOrder, SortSpec};
use fedcatrs::domain::repositories::catalog_cache::CatalogCache;
use fedcatrs::infrastructure::repositories::memory_catalog_cache::MemoryCatalogCache;
use fedcatrs::infrastructure::repositories::redis_catalog_cache::RedisCatalogCache;
use fedcatrs::infrastructure::repositories::sql_catalog_cache::SqlCatalogCache;
use serde_json::json;
use std::sync::Arc;
use testcontainers::runners::AsyncRunner;

fn weather_offer(id: &str, size: i64) -> (&str, serde_json::Value, serde_json::Value) {
    (
        id,
        json!({"dct:title": format!("weather {id}"), "size": size}),
        json!({"odrl:permission": {"odrl:action": "use"}}),
    )
}

async fn put_replaces_wholesale<C: CatalogCache>(cache: &C) {
    let first = snapshot("provider-a", vec![weather_offer("offer-1", 10), weather_offer("offer-2", 20)]);
    cache.put(&first).await.unwrap();

    let stored = cache.get("provider-a").await.unwrap().unwrap();
    assert_eq!(stored.offers.len(), 2);
    assert_eq!(stored.content_hash, first.content_hash);
    assert_eq!(stored.protocol_version, first.protocol_version);

    // 替换后旧条目不残留
    let second = snapshot("provider-a", vec![weather_offer("offer-3", 30)]);
    cache.put(&second).await.unwrap();
    let stored = cache.get("provider-a").await.unwrap().unwrap();
    assert_eq!(stored.offers.len(), 1);
    assert_eq!(stored.offers[0].id, "offer-3");
    assert_ne!(stored.content_hash, first.content_hash);
}

async fn missing_participant_reads_none<C: CatalogCache>(cache: &C) {
    assert!(cache.get("provider-x").await.unwrap().is_none());
    assert!(cache.participant_ids().await.unwrap().is_empty());
    assert!(cache.query(&OfferQuery::default()).await.unwrap().is_empty());
}

async fn delete_is_idempotent_and_prunes_index<C: CatalogCache>(cache: &C) {
    cache
        .put(&snapshot("provider-a", vec![weather_offer("offer-1", 10)]))
        .await
        .unwrap();
    cache
        .put(&snapshot("provider-b", vec![weather_offer("offer-2", 20)]))
        .await
        .unwrap();

    cache.delete("provider-a").await.unwrap();
    cache.delete("provider-a").await.unwrap();

    assert!(cache.get("provider-a").await.unwrap().is_none());
    assert_eq!(cache.participant_ids().await.unwrap(), vec!["provider-b"]);
    let hits = cache.query(&OfferQuery::default()).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].participant_id, "provider-b");
}

async fn query_spans_participants<C: CatalogCache>(cache: &C) {
    cache
        .put(&snapshot(
            "provider-a",
            vec![weather_offer("offer-1", 10), weather_offer("offer-2", 25)],
        ))
        .await
        .unwrap();
    cache
        .put(&snapshot("provider-b", vec![weather_offer("offer-3", 40)]))
        .await
        .unwrap();

    // 条件过滤跨全部快照
    let q = OfferQuery {
        criteria: vec![Criterion::new("asset.size", CriterionOp::Gte, json!(25))],
        sort: Some(SortSpec {
            field: "asset.size".to_string(),
            order: SortOrder::Desc,
        }),
        ..Default::default()
    };
    let hits = cache.query(&q).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].offer.id, "offer-3");
    assert_eq!(hits[0].participant_id, "provider-b");
    assert_eq!(hits[1].offer.id, "offer-2");

    // 参与方限定
    let q = OfferQuery {
        participant_ids: vec!["provider-a".to_string()],
        ..Default::default()
    };
    let hits = cache.query(&q).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.participant_id == "provider-a"));

    // 参与方清单按字典序返回
    assert_eq!(
        cache.participant_ids().await.unwrap(),
        vec!["provider-a", "provider-b"]
    );
}

async fn concurrent_puts_on_distinct_keys<C>(cache: Arc<C>)
where
    C: CatalogCache + 'static,
{
    let mut handles = Vec::new();
    for i in 0..8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            let participant = format!("provider-{i}");
            let snap = snapshot(
                &participant,
                vec![weather_offer("offer-1", i), weather_offer("offer-2", i + 1)],
            );
            cache.put(&snap).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(cache.participant_ids().await.unwrap().len(), 8);
    let q = OfferQuery {
        limit: 0,
        ..Default::default()
    };
    assert_eq!(cache.query(&q).await.unwrap().len(), 16);
}

mod memory_cache_contract {
    use super::*;

    #[tokio::test]
    async fn put_replaces_wholesale() {
        super::put_replaces_wholesale(&MemoryCatalogCache::new()).await;
    }

    #[tokio::test]
    async fn missing_participant_reads_none() {
        super::missing_participant_reads_none(&MemoryCatalogCache::new()).await;
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_prunes_index() {
        super::delete_is_idempotent_and_prunes_index(&MemoryCatalogCache::new()).await;
    }

    #[tokio::test]
    async fn query_spans_participants() {
        super::query_spans_participants(&MemoryCatalogCache::new()).await;
    }

    #[tokio::test]
    async fn concurrent_puts_on_distinct_keys() {
        super::concurrent_puts_on_distinct_keys(Arc::new(MemoryCatalogCache::new())).await;
    }
}

mod sql_cache_contract {
    use super::*;

    #[tokio::test]
    async fn put_replaces_wholesale() {
        super::put_replaces_wholesale(&SqlCatalogCache::new(sqlite_db().await)).await;
    }

    #[tokio::test]
    async fn missing_participant_reads_none() {
        super::missing_participant_reads_none(&SqlCatalogCache::new(sqlite_db().await)).await;
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_prunes_index() {
        super::delete_is_idempotent_and_prunes_index(&SqlCatalogCache::new(sqlite_db().await))
            .await;
    }

    #[tokio::test]
    async fn query_spans_participants() {
        super::query_spans_participants(&SqlCatalogCache::new(sqlite_db().await)).await;
    }

    #[tokio::test]
    async fn concurrent_puts_on_distinct_keys() {
        super::concurrent_puts_on_distinct_keys(Arc::new(SqlCatalogCache::new(sqlite_db().await)))
            .await;
    }
}

mod redis_cache_contract {
    use super::*;

    async fn redis_cache() -> (
        testcontainers::ContainerAsync<testcontainers::GenericImage>,
        RedisCatalogCache,
    ) {
        let node = testcontainers::GenericImage::new("redis", "7-alpine")
            .start()
            .await
            .expect("Failed to start Redis");
        let port = node
            .get_host_port_ipv4(6379)
            .await
            .expect("Failed to get Redis port");
        let cache = RedisCatalogCache::new(&format!("redis://127.0.0.1:{port}")).unwrap();
        (node, cache)
    }

    #[tokio::test]
    #[ignore = "requires a local Docker daemon"]
    async fn put_replaces_wholesale() {
        let (_node, cache) = redis_cache().await;
        super::put_replaces_wholesale(&cache).await;
    }

    #[tokio::test]
    #[ignore = "requires a local Docker daemon"]
    async fn missing_participant_reads_none() {
        let (_node, cache) = redis_cache().await;
        super::missing_participant_reads_none(&cache).await;
    }

    #[tokio::test]
    #[ignore = "requires a local Docker daemon"]
    async fn delete_is_idempotent_and_prunes_index() {
        let (_node, cache) = redis_cache().await;
        super::delete_is_idempotent_and_prunes_index(&cache).await;
    }

    #[tokio::test]
    #[ignore = "requires a local Docker daemon"]
    async fn query_spans_participants() {
        let (_node, cache) = redis_cache().await;
        super::query_spans_participants(&cache).await;
    }

    #[tokio::test]
    #[ignore = "requires a local Docker daemon"]
    async fn concurrent_puts_on_distinct_keys() {
        let (_node, cache) = redis_cache().await;
        super::concurrent_puts_on_distinct_keys(Arc::new(cache)).await;
    }
}
