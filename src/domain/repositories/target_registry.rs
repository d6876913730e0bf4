// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::outcome::CrawlOutcome;
use crate::domain::models::target::{CrawlTarget, NewTarget, TargetPatch};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// 注册表错误类型
#[derive(Error, Debug)]
pub enum RegistryError {
    /// 参与方URL已注册
    #[error("Target already registered for url: {0}")]
    DuplicateTarget(String),
    /// 目标未找到
    #[error("Target not found: {0}")]
    TargetNotFound(Uuid),
    /// 领域规则校验失败
    #[error("Validation error: {0}")]
    Validation(String),
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 后端存储错误
    #[error("Storage error: {0}")]
    Storage(String),
}

/// 目标列表过滤
#[derive(Debug, Default, Clone)]
pub struct TargetFilter {
    /// 只返回指定启用状态的目标
    pub enabled: Option<bool>,
}

/// 目标注册表特质
///
/// 维护参与方抓取目标及其调度状态和健康记录。所有写操作同步
/// 生效；对调度行为的影响从下一个调度周期开始。状态转换方法
/// （`try_schedule`/`mark_in_flight`/`release`/`record_outcome`）
/// 必须原子执行，这是同一目标至多一次在途抓取的基础。
#[async_trait]
pub trait TargetRegistry: Send + Sync {
    /// 注册新目标，参与方URL重复时返回DuplicateTarget
    async fn add(&self, new: NewTarget) -> Result<CrawlTarget, RegistryError>;
    /// 移除目标；在途抓取允许完成但其结果会被丢弃
    async fn remove(&self, id: Uuid) -> Result<(), RegistryError>;
    /// 部分更新名称、周期或启用开关
    async fn update(&self, id: Uuid, patch: TargetPatch) -> Result<CrawlTarget, RegistryError>;
    /// 根据ID查找目标
    async fn find_by_id(&self, id: Uuid) -> Result<Option<CrawlTarget>, RegistryError>;
    /// 列出目标，按注册顺序排序
    async fn list(&self, filter: TargetFilter) -> Result<Vec<CrawlTarget>, RegistryError>;
    /// 列出当前到期可抓的目标，按注册顺序排序
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<CrawlTarget>, RegistryError>;
    /// 原子地把目标从Idle置为Scheduled；目标不可调度时返回false
    async fn try_schedule(&self, id: Uuid) -> Result<bool, RegistryError>;
    /// 把目标从Scheduled置为InFlight并记录尝试时间
    async fn mark_in_flight(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RegistryError>;
    /// 把目标从Scheduled退回Idle，不记录尝试；目标已移除时为空操作
    async fn release(&self, id: Uuid) -> Result<(), RegistryError>;
    /// 提交尝试记账并把目标落回Idle；目标已移除时为空操作
    async fn record_outcome(
        &self,
        id: Uuid,
        outcome: &CrawlOutcome,
        next_eligible_at: DateTime<Utc>,
    ) -> Result<(), RegistryError>;
    /// 复位滞留在Scheduled/InFlight的目标
    ///
    /// 崩溃或被放弃的尝试会让目标卡在中间状态。复位早于
    /// `stuck_after`之前最后更新的此类目标，健康记录保持不动，
    /// 返回复位数量。
    async fn reset_stuck(&self, stuck_after: chrono::Duration) -> Result<u64, RegistryError>;
}

#[async_trait]
impl<T: TargetRegistry + ?Sized> TargetRegistry for Arc<T> {
    async fn add(&self, new: NewTarget) -> Result<CrawlTarget, RegistryError> {
        (**self).add(new).await
    }

    async fn remove(&self, id: Uuid) -> Result<(), RegistryError> {
        (**self).remove(id).await
    }

    async fn update(&self, id: Uuid, patch: TargetPatch) -> Result<CrawlTarget, RegistryError> {
        (**self).update(id, patch).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CrawlTarget>, RegistryError> {
        (**self).find_by_id(id).await
    }

    async fn list(&self, filter: TargetFilter) -> Result<Vec<CrawlTarget>, RegistryError> {
        (**self).list(filter).await
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<CrawlTarget>, RegistryError> {
        (**self).due(now).await
    }

    async fn try_schedule(&self, id: Uuid) -> Result<bool, RegistryError> {
        (**self).try_schedule(id).await
    }

    async fn mark_in_flight(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RegistryError> {
        (**self).mark_in_flight(id, now).await
    }

    async fn release(&self, id: Uuid) -> Result<(), RegistryError> {
        (**self).release(id).await
    }

    async fn record_outcome(
        &self,
        id: Uuid,
        outcome: &CrawlOutcome,
        next_eligible_at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        (**self).record_outcome(id, outcome, next_eligible_at).await
    }

    async fn reset_stuck(&self, stuck_after: chrono::Duration) -> Result<u64, RegistryError> {
        (**self).reset_stuck(stuck_after).await
    }
}
