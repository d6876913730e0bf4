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

use crate::domain::models::outcome::CrawlOutcome;
use crate::domain::models::target::{CrawlTarget, NewTarget, TargetPatch, TargetState};
use crate::domain::repositories::target_registry::{RegistryError, TargetFilter, TargetRegistry};
use crate::infrastructure::database::entities::crawl_target as target_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

/// SQL目标注册表
///
/// 基于SeaORM的持久化实现，支持Postgres与SQLite。状态转换通过
/// 条件更新的受影响行数实现原子CAS，不依赖行锁。
#[derive(Clone)]
pub struct SqlTargetRegistry {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl SqlTargetRegistry {
    /// 创建新的注册表实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<target_entity::Model> for CrawlTarget {
    fn from(model: target_entity::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            url: model.url,
            participant_id: model.participant_id,
            protocol_version: model.protocol_version,
            interval_secs: model.interval_secs,
            enabled: model.enabled,
            state: model.state.parse().unwrap_or_default(),
            consecutive_failures: model.consecutive_failures,
            last_attempt_at: model.last_attempt_at,
            last_success_at: model.last_success_at,
            next_eligible_at: model.next_eligible_at,
            seq: model.seq,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<CrawlTarget> for target_entity::ActiveModel {
    fn from(target: CrawlTarget) -> Self {
        Self {
            id: Set(target.id),
            name: Set(target.name),
            url: Set(target.url),
            participant_id: Set(target.participant_id),
            protocol_version: Set(target.protocol_version),
            interval_secs: Set(target.interval_secs),
            enabled: Set(target.enabled),
            state: Set(target.state.to_string()),
            consecutive_failures: Set(target.consecutive_failures),
            last_attempt_at: Set(target.last_attempt_at),
            last_success_at: Set(target.last_success_at),
            next_eligible_at: Set(target.next_eligible_at),
            seq: Set(target.seq),
            created_at: Set(target.created_at),
            updated_at: Set(target.updated_at),
        }
    }
}

#[async_trait]
impl TargetRegistry for SqlTargetRegistry {
    async fn add(&self, new: NewTarget) -> Result<CrawlTarget, RegistryError> {
        let mut target = CrawlTarget::try_new(new)
            .map_err(|e| RegistryError::Validation(e.to_string()))?;

        let txn = self.db.begin().await?;

        let existing = target_entity::Entity::find()
            .filter(target_entity::Column::Url.eq(target.url.clone()))
            .count(&txn)
            .await?;
        if existing > 0 {
            txn.rollback().await?;
            return Err(RegistryError::DuplicateTarget(target.url));
        }

        let last_seq = target_entity::Entity::find()
            .select_only()
            .column(target_entity::Column::Seq)
            .order_by_desc(target_entity::Column::Seq)
            .limit(1)
            .into_tuple::<i64>()
            .one(&txn)
            .await?
            .unwrap_or(0);
        target.seq = last_seq + 1;

        let model: target_entity::ActiveModel = target.clone().into();
        model.insert(&txn).await?;
        txn.commit().await?;

        Ok(target)
    }

    async fn remove(&self, id: Uuid) -> Result<(), RegistryError> {
        let result = target_entity::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(RegistryError::TargetNotFound(id));
        }
        Ok(())
    }

    async fn update(&self, id: Uuid, patch: TargetPatch) -> Result<CrawlTarget, RegistryError> {
        let model = target_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(RegistryError::TargetNotFound(id))?;

        let patched = CrawlTarget::from(model)
            .apply_patch(patch)
            .map_err(|e| RegistryError::Validation(e.to_string()))?;

        let mut active = target_entity::ActiveModel {
            id: Set(id),
            ..Default::default()
        };
        active.name = Set(patched.name.clone());
        active.interval_secs = Set(patched.interval_secs);
        active.enabled = Set(patched.enabled);
        active.updated_at = Set(patched.updated_at);
        active.update(self.db.as_ref()).await?;

        Ok(patched)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CrawlTarget>, RegistryError> {
        let model = target_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(Into::into))
    }

    async fn list(&self, filter: TargetFilter) -> Result<Vec<CrawlTarget>, RegistryError> {
        let mut select = target_entity::Entity::find();
        if let Some(enabled) = filter.enabled {
            select = select.filter(target_entity::Column::Enabled.eq(enabled));
        }
        let models = select
            .order_by_asc(target_entity::Column::Seq)
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(CrawlTarget::from).collect())
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<CrawlTarget>, RegistryError> {
        let models = target_entity::Entity::find()
            .filter(target_entity::Column::Enabled.eq(true))
            .filter(target_entity::Column::State.eq(TargetState::Idle.to_string()))
            .filter(
                Condition::any()
                    .add(target_entity::Column::NextEligibleAt.is_null())
                    .add(target_entity::Column::NextEligibleAt.lte(now)),
            )
            .order_by_asc(target_entity::Column::Seq)
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(CrawlTarget::from).collect())
    }

    async fn try_schedule(&self, id: Uuid) -> Result<bool, RegistryError> {
        // 条件更新即CAS：只有恰好处于Idle且启用的目标会被置为Scheduled
        let result = target_entity::Entity::update_many()
            .col_expr(
                target_entity::Column::State,
                Expr::value(TargetState::Scheduled.to_string()),
            )
            .col_expr(
                target_entity::Column::UpdatedAt,
                Expr::value::<DateTime<FixedOffset>>(Utc::now().into()),
            )
            .filter(target_entity::Column::Id.eq(id))
            .filter(target_entity::Column::State.eq(TargetState::Idle.to_string()))
            .filter(target_entity::Column::Enabled.eq(true))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn mark_in_flight(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RegistryError> {
        let result = target_entity::Entity::update_many()
            .col_expr(
                target_entity::Column::State,
                Expr::value(TargetState::InFlight.to_string()),
            )
            .col_expr(
                target_entity::Column::LastAttemptAt,
                Expr::value::<Option<DateTime<FixedOffset>>>(Some(now.into())),
            )
            .col_expr(
                target_entity::Column::UpdatedAt,
                Expr::value::<DateTime<FixedOffset>>(now.into()),
            )
            .filter(target_entity::Column::Id.eq(id))
            .filter(target_entity::Column::State.eq(TargetState::Scheduled.to_string()))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            // 区分目标被移除与状态不符
            let exists = target_entity::Entity::find_by_id(id)
                .count(self.db.as_ref())
                .await?;
            if exists == 0 {
                return Err(RegistryError::TargetNotFound(id));
            }
            return Err(RegistryError::Validation(
                "invalid state transition".to_string(),
            ));
        }
        Ok(())
    }

    async fn release(&self, id: Uuid) -> Result<(), RegistryError> {
        target_entity::Entity::update_many()
            .col_expr(
                target_entity::Column::State,
                Expr::value(TargetState::Idle.to_string()),
            )
            .col_expr(
                target_entity::Column::UpdatedAt,
                Expr::value::<DateTime<FixedOffset>>(Utc::now().into()),
            )
            .filter(target_entity::Column::Id.eq(id))
            .filter(target_entity::Column::State.eq(TargetState::Scheduled.to_string()))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn record_outcome(
        &self,
        id: Uuid,
        outcome: &CrawlOutcome,
        next_eligible_at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();
        let mut update = target_entity::Entity::update_many()
            .col_expr(
                target_entity::Column::State,
                Expr::value(TargetState::Idle.to_string()),
            )
            .col_expr(
                target_entity::Column::NextEligibleAt,
                Expr::value::<Option<DateTime<FixedOffset>>>(Some(next_eligible_at.into())),
            )
            .col_expr(target_entity::Column::UpdatedAt, Expr::value(now));

        if outcome.success {
            update = update
                .col_expr(target_entity::Column::ConsecutiveFailures, Expr::value(0))
                .col_expr(
                    target_entity::Column::LastSuccessAt,
                    Expr::value::<Option<DateTime<FixedOffset>>>(Some(now)),
                );
        } else if outcome.counts_against_target() {
            update = update.col_expr(
                target_entity::Column::ConsecutiveFailures,
                Expr::col(target_entity::Column::ConsecutiveFailures).add(1),
            );
        }

        // 受影响行数为零说明目标已被移除，结果整体作废
        update
            .filter(target_entity::Column::Id.eq(id))
            .filter(target_entity::Column::State.eq(TargetState::InFlight.to_string()))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn reset_stuck(&self, stuck_after: chrono::Duration) -> Result<u64, RegistryError> {
        let now = Utc::now();
        let cutoff: DateTime<FixedOffset> = (now - stuck_after).into();
        let result = target_entity::Entity::update_many()
            .col_expr(
                target_entity::Column::State,
                Expr::value(TargetState::Idle.to_string()),
            )
            .col_expr(
                target_entity::Column::UpdatedAt,
                Expr::value::<DateTime<FixedOffset>>(now.into()),
            )
            .filter(target_entity::Column::State.is_in([
                TargetState::Scheduled.to_string(),
                TargetState::InFlight.to_string(),
            ]))
            .filter(target_entity::Column::UpdatedAt.lte(cutoff))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}
