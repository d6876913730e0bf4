// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::snapshot::{CatalogSnapshot, OfferRecord};
use crate::domain::query::OfferQuery;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// 缓存错误类型
#[derive(Error, Debug)]
pub enum CacheError {
    /// 存储不可用，调用方应挂起写入并退避重试
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),
    /// 后端返回的其他错误
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// 目录缓存特质
///
/// 以参与方为键保存目录快照。`put`整体替换该参与方的快照且对
/// 单个键线性化：读者要么看到旧快照要么看到新快照，绝不会看到
/// 半写状态。跨参与方的读取可以与并发写交错。
#[async_trait]
pub trait CatalogCache: Send + Sync {
    /// 写入或整体替换一个参与方的快照
    async fn put(&self, snapshot: &CatalogSnapshot) -> Result<(), CacheError>;
    /// 读取一个参与方的当前快照
    async fn get(&self, participant_id: &str) -> Result<Option<CatalogSnapshot>, CacheError>;
    /// 跨全部快照查询条目，命中带参与方归属
    async fn query(&self, query: &OfferQuery) -> Result<Vec<OfferRecord>, CacheError>;
    /// 删除一个参与方的快照，幂等
    async fn delete(&self, participant_id: &str) -> Result<(), CacheError>;
    /// 列出当前持有快照的参与方
    async fn participant_ids(&self) -> Result<Vec<String>, CacheError>;
}

#[async_trait]
impl<T: CatalogCache + ?Sized> CatalogCache for Arc<T> {
    async fn put(&self, snapshot: &CatalogSnapshot) -> Result<(), CacheError> {
        (**self).put(snapshot).await
    }

    async fn get(&self, participant_id: &str) -> Result<Option<CatalogSnapshot>, CacheError> {
        (**self).get(participant_id).await
    }

    async fn query(&self, query: &OfferQuery) -> Result<Vec<OfferRecord>, CacheError> {
        (**self).query(query).await
    }

    async fn delete(&self, participant_id: &str) -> Result<(), CacheError> {
        (**self).delete(participant_id).await
    }

    async fn participant_ids(&self) -> Result<Vec<String>, CacheError> {
        (**self).participant_ids().await
    }
}
