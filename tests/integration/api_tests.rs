// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 查询API集成测试
//!
//! 在内存缓存上组装完整路由，验证查询入口的请求校验、声明解析、
//! 访问裁决与各端点的响应形状。

use super::helpers::{snapshot, test_server};
use fedcatrs::domain::models::snapshot::OfferRecord;
use fedcatrs::domain::repositories::catalog_cache::CatalogCache;
use fedcatrs::domain::services::query_service::{AllowAllPolicy, OfferPolicy};
use fedcatrs::infrastructure::repositories::memory_catalog_cache::MemoryCatalogCache;
use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

async fn seeded_cache() -> Arc<MemoryCatalogCache> {
    let cache = Arc::new(MemoryCatalogCache::new());
    cache
        .put(&snapshot(
            "provider-a",
            vec![
                (
                    "offer-1",
                    json!({"dct:title": "weather data", "dcat:theme": "weather"}),
                    json!({"odrl:permission": {"odrl:action": "use"}}),
                ),
                (
                    "offer-2",
                    json!({"dct:title": "traffic data", "dcat:theme": "mobility"}),
                    json!({"odrl:permission": {"odrl:action": "use"}}),
                ),
            ],
        ))
        .await
        .unwrap();
    cache
        .put(&snapshot(
            "provider-b",
            vec![(
                "offer-3",
                json!({"dct:title": "weather forecasts", "dcat:theme": "weather"}),
                json!({}),
            )],
        ))
        .await
        .unwrap();
    cache
}

#[tokio::test]
async fn health_and_version_endpoints() {
    let server = test_server(Arc::new(MemoryCatalogCache::new()), Arc::new(AllowAllPolicy));

    let response = server.get("/health").await;
    response.assert_status(StatusCode::OK);
    response.assert_text("OK");

    let response = server.get("/v1/version").await;
    response.assert_status(StatusCode::OK);
    assert!(!response.text().is_empty());
}

#[tokio::test]
async fn query_with_empty_body_returns_all_offers() {
    let server = test_server(seeded_cache().await, Arc::new(AllowAllPolicy));

    let response = server.post("/v1alpha/catalog/query").json(&json!({})).await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["count"], json!(3));
    assert_eq!(body["offers"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn query_filters_by_criteria_and_participants() {
    let server = test_server(seeded_cache().await, Arc::new(AllowAllPolicy));

    let response = server
        .post("/v1alpha/catalog/query")
        .json(&json!({
            "criteria": [{"field": "asset.dcat:theme", "op": "=", "value": "weather"}],
        }))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["count"], json!(2));

    let response = server
        .post("/v1alpha/catalog/query")
        .json(&json!({
            "criteria": [{"field": "asset.dcat:theme", "op": "=", "value": "weather"}],
            "participant_ids": ["provider-b"],
        }))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["offers"][0]["offer"]["id"], json!("offer-3"));
}

#[tokio::test]
async fn query_respects_sort_offset_and_limit() {
    let server = test_server(seeded_cache().await, Arc::new(AllowAllPolicy));

    let response = server
        .post("/v1alpha/catalog/query")
        .json(&json!({
            "sort": {"field": "id", "order": "desc"},
            "limit": 1,
            "offset": 1,
        }))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["offers"][0]["offer"]["id"], json!("offer-2"));
}

#[tokio::test]
async fn query_rejects_limit_above_cap() {
    let server = test_server(seeded_cache().await, Arc::new(AllowAllPolicy));

    let response = server
        .post("/v1alpha/catalog/query")
        .json(&json!({ "limit": 1001 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("Validation error"));
}

#[tokio::test]
async fn query_rejects_malformed_claims_header() {
    let server = test_server(seeded_cache().await, Arc::new(AllowAllPolicy));

    let response = server
        .post("/v1alpha/catalog/query")
        .add_header("x-claims", "{not json")
        .json(&json!({}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("x-claims"));
}

/// 只放行声明中指定参与方条目的裁决
struct OwnParticipantPolicy;

impl OfferPolicy for OwnParticipantPolicy {
    fn evaluate(&self, claims: &Value, record: &OfferRecord) -> bool {
        claims["participant"] == json!(record.participant_id)
    }
}

#[tokio::test]
async fn query_applies_policy_from_claims() {
    let server = test_server(seeded_cache().await, Arc::new(OwnParticipantPolicy));

    // 无声明：全部条目被裁决剔除
    let response = server.post("/v1alpha/catalog/query").json(&json!({})).await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["count"], json!(0));

    let response = server
        .post("/v1alpha/catalog/query")
        .add_header("x-claims", r#"{"participant": "provider-a"}"#)
        .json(&json!({}))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["count"], json!(2));
    for offer in body["offers"].as_array().unwrap() {
        assert_eq!(offer["participant_id"], json!("provider-a"));
    }
}

#[tokio::test]
async fn participants_endpoint_lists_cached_participants() {
    let server = test_server(seeded_cache().await, Arc::new(AllowAllPolicy));

    let response = server.get("/v1alpha/catalog/participants").await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["count"], json!(2));
    assert_eq!(body["participants"], json!(["provider-a", "provider-b"]));
}

#[tokio::test]
async fn catalog_endpoint_returns_snapshot_or_404() {
    let server = test_server(seeded_cache().await, Arc::new(AllowAllPolicy));

    let response = server.get("/v1alpha/catalog/provider-a").await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["participant_id"], json!("provider-a"));
    assert_eq!(body["offers"].as_array().unwrap().len(), 2);
    assert!(body["content_hash"].as_str().is_some());

    let response = server.get("/v1alpha/catalog/provider-x").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("not found"));
}
