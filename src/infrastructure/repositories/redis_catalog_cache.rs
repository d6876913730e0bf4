// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::snapshot::{CatalogSnapshot, OfferRecord};
use crate::domain::query::{self, OfferQuery};
use crate::domain::repositories::catalog_cache::{CacheError, CatalogCache};
use async_trait::async_trait;
use redis::AsyncCommands;

/// 快照键前缀
const SNAPSHOT_KEY_PREFIX: &str = "fedcatrs:snapshot:";
/// 参与方索引集合键
const INDEX_KEY: &str = "fedcatrs:snapshots";

/// Redis目录缓存
///
/// 每个快照序列化为一个字符串键，参与方标识另存于索引集合。
/// 写入与删除通过MULTI事务同时更新数据键与索引，保证两者一致。
#[derive(Clone)]
pub struct RedisCatalogCache {
    /// Redis客户端
    client: redis::Client,
}

impl RedisCatalogCache {
    /// 创建新的缓存实例
    ///
    /// # 参数
    ///
    /// * `redis_url` - Redis连接URL
    pub fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(Self { client })
    }

    fn snapshot_key(participant_id: &str) -> String {
        format!("{SNAPSHOT_KEY_PREFIX}{participant_id}")
    }
}

fn map_redis_err(err: redis::RedisError) -> CacheError {
    if err.is_io_error() || err.is_timeout() || err.is_connection_dropped() {
        CacheError::Unavailable(err.to_string())
    } else {
        CacheError::Backend(err.to_string())
    }
}

#[async_trait]
impl CatalogCache for RedisCatalogCache {
    async fn put(&self, snapshot: &CatalogSnapshot) -> Result<(), CacheError> {
        let payload =
            serde_json::to_string(snapshot).map_err(|e| CacheError::Backend(e.to_string()))?;
        let mut con = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_err)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(Self::snapshot_key(&snapshot.participant_id), payload)
            .sadd(INDEX_KEY, &snapshot.participant_id);
        let _: () = pipe.query_async(&mut con).await.map_err(map_redis_err)?;
        Ok(())
    }

    async fn get(&self, participant_id: &str) -> Result<Option<CatalogSnapshot>, CacheError> {
        let mut con = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_err)?;
        let payload: Option<String> = con
            .get(Self::snapshot_key(participant_id))
            .await
            .map_err(map_redis_err)?;

        match payload {
            Some(raw) => {
                let snapshot = serde_json::from_str(&raw)
                    .map_err(|e| CacheError::Backend(e.to_string()))?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    async fn query(&self, offer_query: &OfferQuery) -> Result<Vec<OfferRecord>, CacheError> {
        let mut con = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_err)?;
        let mut ids: Vec<String> = con.smembers(INDEX_KEY).await.map_err(map_redis_err)?;
        if !offer_query.participant_ids.is_empty() {
            ids.retain(|id| offer_query.participant_ids.contains(id));
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| Self::snapshot_key(id)).collect();
        // 显式MGET：单键时redis库的get会退化为GET并改变应答形状
        let payloads: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut con)
            .await
            .map_err(map_redis_err)?;

        let mut records = Vec::new();
        for raw in payloads.into_iter().flatten() {
            let snapshot: CatalogSnapshot =
                serde_json::from_str(&raw).map_err(|e| CacheError::Backend(e.to_string()))?;
            let participant_id = snapshot.participant_id.clone();
            records.extend(snapshot.offers.into_iter().map(|offer| OfferRecord {
                participant_id: participant_id.clone(),
                offer,
            }));
        }

        Ok(query::apply(records, offer_query))
    }

    async fn delete(&self, participant_id: &str) -> Result<(), CacheError> {
        let mut con = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_err)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(Self::snapshot_key(participant_id))
            .srem(INDEX_KEY, participant_id);
        let _: () = pipe.query_async(&mut con).await.map_err(map_redis_err)?;
        Ok(())
    }

    async fn participant_ids(&self) -> Result<Vec<String>, CacheError> {
        let mut con = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_err)?;
        let mut ids: Vec<String> = con.smembers(INDEX_KEY).await.map_err(map_redis_err)?;
        ids.sort();
        Ok(ids)
    }
}
