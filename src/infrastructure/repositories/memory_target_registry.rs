// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::outcome::CrawlOutcome;
use crate::domain::models::target::{CrawlTarget, DomainError, NewTarget, TargetPatch, TargetState};
use crate::domain::repositories::target_registry::{RegistryError, TargetFilter, TargetRegistry};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

/// 内存目标注册表
///
/// 基于DashMap的进程内实现，供单进程部署与测试使用。状态转换
/// 在单个条目的独占引用下进行，与SQL实现满足同一契约。
#[derive(Default)]
pub struct MemoryTargetRegistry {
    targets: DashMap<Uuid, CrawlTarget>,
    url_index: DashMap<String, Uuid>,
    seq: AtomicI64,
}

impl MemoryTargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

fn map_domain(err: DomainError) -> RegistryError {
    RegistryError::Validation(err.to_string())
}

#[async_trait]
impl TargetRegistry for MemoryTargetRegistry {
    async fn add(&self, new: NewTarget) -> Result<CrawlTarget, RegistryError> {
        let mut target = CrawlTarget::try_new(new).map_err(map_domain)?;
        match self.url_index.entry(target.url.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(RegistryError::DuplicateTarget(target.url))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                target.seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
                entry.insert(target.id);
                self.targets.insert(target.id, target.clone());
                Ok(target)
            }
        }
    }

    async fn remove(&self, id: Uuid) -> Result<(), RegistryError> {
        match self.targets.remove(&id) {
            Some((_, target)) => {
                self.url_index.remove(&target.url);
                Ok(())
            }
            None => Err(RegistryError::TargetNotFound(id)),
        }
    }

    async fn update(&self, id: Uuid, patch: TargetPatch) -> Result<CrawlTarget, RegistryError> {
        let mut entry = self
            .targets
            .get_mut(&id)
            .ok_or(RegistryError::TargetNotFound(id))?;
        let updated = entry.clone().apply_patch(patch).map_err(map_domain)?;
        *entry = updated.clone();
        Ok(updated)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CrawlTarget>, RegistryError> {
        Ok(self.targets.get(&id).map(|t| t.clone()))
    }

    async fn list(&self, filter: TargetFilter) -> Result<Vec<CrawlTarget>, RegistryError> {
        let mut targets: Vec<CrawlTarget> = self
            .targets
            .iter()
            .filter(|t| filter.enabled.map(|e| t.enabled == e).unwrap_or(true))
            .map(|t| t.clone())
            .collect();
        targets.sort_by_key(|t| t.seq);
        Ok(targets)
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<CrawlTarget>, RegistryError> {
        let mut targets: Vec<CrawlTarget> = self
            .targets
            .iter()
            .filter(|t| t.is_due(now))
            .map(|t| t.clone())
            .collect();
        targets.sort_by_key(|t| t.seq);
        Ok(targets)
    }

    async fn try_schedule(&self, id: Uuid) -> Result<bool, RegistryError> {
        let Some(mut entry) = self.targets.get_mut(&id) else {
            return Ok(false);
        };
        match entry.clone().schedule() {
            Ok(scheduled) => {
                *entry = scheduled;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    async fn mark_in_flight(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RegistryError> {
        let mut entry = self
            .targets
            .get_mut(&id)
            .ok_or(RegistryError::TargetNotFound(id))?;
        let in_flight = entry.clone().begin_attempt(now).map_err(map_domain)?;
        *entry = in_flight;
        Ok(())
    }

    async fn release(&self, id: Uuid) -> Result<(), RegistryError> {
        let Some(mut entry) = self.targets.get_mut(&id) else {
            return Ok(());
        };
        if let Ok(idle) = entry.clone().release() {
            *entry = idle;
        }
        Ok(())
    }

    async fn record_outcome(
        &self,
        id: Uuid,
        outcome: &CrawlOutcome,
        next_eligible_at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        // 目标已移除时结果整体作废
        let Some(mut entry) = self.targets.get_mut(&id) else {
            return Ok(());
        };
        let now = Utc::now();
        let settled = if outcome.success {
            entry.clone().succeed(now)
        } else {
            entry.clone().fail(outcome.counts_against_target())
        }
        .and_then(|t| t.settle(next_eligible_at));

        if let Ok(settled) = settled {
            *entry = settled;
        }
        Ok(())
    }

    async fn reset_stuck(&self, stuck_after: chrono::Duration) -> Result<u64, RegistryError> {
        let now = Utc::now();
        let cutoff: DateTime<FixedOffset> = (now - stuck_after).into();
        let mut reset = 0u64;
        for mut entry in self.targets.iter_mut() {
            if matches!(entry.state, TargetState::Scheduled | TargetState::InFlight)
                && entry.updated_at <= cutoff
            {
                entry.state = TargetState::Idle;
                entry.updated_at = now.into();
                reset += 1;
            }
        }
        Ok(reset)
    }
}
