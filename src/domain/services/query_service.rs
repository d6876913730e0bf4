// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::snapshot::{CatalogSnapshot, OfferRecord};
use crate::domain::query::OfferQuery;
use crate::domain::repositories::catalog_cache::{CacheError, CatalogCache};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// 查询错误类型
#[derive(Error, Debug)]
pub enum QueryError {
    /// 缓存读取失败
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// 访问裁决特质
///
/// 在条件过滤之后对每个命中条目做最终裁决，未通过的条目从结果
/// 中剔除。裁决只看调用方声明与条目本身，不做任何I/O。
pub trait OfferPolicy: Send + Sync {
    /// 裁决调用方是否可见该条目
    fn evaluate(&self, claims: &serde_json::Value, record: &OfferRecord) -> bool;
}

/// 放行全部条目的默认裁决
pub struct AllowAllPolicy;

impl OfferPolicy for AllowAllPolicy {
    fn evaluate(&self, _claims: &serde_json::Value, _record: &OfferRecord) -> bool {
        true
    }
}

/// 目录查询服务
///
/// 只读门面：对外提供条目查询、单参与方快照与参与方清单。永远
/// 以缓存当前持有的最近一次成功快照作答，抓取失败在这里只表现
/// 为数据停留在旧版本。
pub struct QueryService<C: CatalogCache> {
    cache: C,
    policy: Arc<dyn OfferPolicy>,
}

impl<C: CatalogCache> QueryService<C> {
    /// 创建新的查询服务实例
    ///
    /// # 参数
    ///
    /// * `cache` - 快照缓存
    /// * `policy` - 条目访问裁决
    pub fn new(cache: C, policy: Arc<dyn OfferPolicy>) -> Self {
        Self { cache, policy }
    }

    /// 跨全部快照查询条目
    ///
    /// # 参数
    ///
    /// * `query` - 查询条件
    /// * `claims` - 调用方声明，用于访问裁决
    ///
    /// # 返回值
    ///
    /// * `Ok(Vec<OfferRecord>)` - 通过过滤与裁决的条目
    /// * `Err(QueryError)` - 缓存读取失败
    pub async fn offers(
        &self,
        query: &OfferQuery,
        claims: &serde_json::Value,
    ) -> Result<Vec<OfferRecord>, QueryError> {
        let matched = self.cache.query(query).await?;
        let total = matched.len();
        let visible: Vec<OfferRecord> = matched
            .into_iter()
            .filter(|record| self.policy.evaluate(claims, record))
            .collect();
        if visible.len() < total {
            debug!(
                dropped = total - visible.len(),
                "Offers withheld by access policy"
            );
        }
        Ok(visible)
    }

    /// 读取一个参与方的完整快照
    pub async fn catalog(
        &self,
        participant_id: &str,
    ) -> Result<Option<CatalogSnapshot>, QueryError> {
        Ok(self.cache.get(participant_id).await?)
    }

    /// 列出当前持有快照的参与方
    pub async fn participants(&self) -> Result<Vec<String>, QueryError> {
        Ok(self.cache.participant_ids().await?)
    }
}
