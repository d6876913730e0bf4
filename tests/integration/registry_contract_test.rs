// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 目标注册表契约套件
//!
//! 同一组断言跑在内存与SQL两个实现上，保证可互换：注册去重、
//! 部分更新、到期筛选、调度状态机的原子转换与滞留复位。

use super::helpers::{new_target, sqlite_db};
use fedcatrs::domain::models::outcome::{ContentDelta, CrawlErrorKind, CrawlOutcome};
use fedcatrs::domain::models::target::{TargetPatch, TargetState};
use fedcatrs::domain::repositories::target_registry::{
    RegistryError, TargetFilter, TargetRegistry,
};
use fedcatrs::infrastructure::repositories::memory_target_registry::MemoryTargetRegistry;
use fedcatrs::infrastructure::repositories::sql_target_registry::SqlTargetRegistry;
use chrono::Utc;

async fn add_is_unique_by_url<R: TargetRegistry>(registry: &R) {
    let a = registry
        .add(new_target("https://a.example.com/dsp", "provider-a", 60))
        .await
        .unwrap();
    assert_eq!(a.state, TargetState::Idle);
    assert!(a.enabled);
    assert!(a.next_eligible_at.is_none());

    let err = registry
        .add(new_target("https://a.example.com/dsp", "provider-a2", 60))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateTarget(_)));

    // 校验失败的注册不落库
    let err = registry
        .add(new_target("https://b.example.com/dsp", "provider-b", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Validation(_)));
    assert_eq!(registry.list(TargetFilter::default()).await.unwrap().len(), 1);
}

async fn remove_frees_url<R: TargetRegistry>(registry: &R) {
    let a = registry
        .add(new_target("https://a.example.com/dsp", "provider-a", 60))
        .await
        .unwrap();
    registry.remove(a.id).await.unwrap();
    assert!(registry.find_by_id(a.id).await.unwrap().is_none());
    assert!(matches!(
        registry.remove(a.id).await.unwrap_err(),
        RegistryError::TargetNotFound(_)
    ));

    // URL随移除释放，可重新注册
    registry
        .add(new_target("https://a.example.com/dsp", "provider-a", 60))
        .await
        .unwrap();
}

async fn update_patches_and_validates<R: TargetRegistry>(registry: &R) {
    let a = registry
        .add(new_target("https://a.example.com/dsp", "provider-a", 60))
        .await
        .unwrap();

    let updated = registry
        .update(
            a.id,
            TargetPatch {
                name: Some("renamed".to_string()),
                interval_secs: Some(300),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.interval_secs, 300);

    let err = registry
        .update(
            a.id,
            TargetPatch {
                interval_secs: Some(-5),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Validation(_)));
    // 失败的更新不产生部分写入
    let stored = registry.find_by_id(a.id).await.unwrap().unwrap();
    assert_eq!(stored.interval_secs, 300);

    assert!(matches!(
        registry
            .update(uuid::Uuid::new_v4(), TargetPatch::default())
            .await
            .unwrap_err(),
        RegistryError::TargetNotFound(_)
    ));
}

async fn list_follows_registration_order<R: TargetRegistry>(registry: &R) {
    for (url, participant) in [
        ("https://c.example.com/dsp", "provider-c"),
        ("https://a.example.com/dsp", "provider-a"),
        ("https://b.example.com/dsp", "provider-b"),
    ] {
        registry.add(new_target(url, participant, 60)).await.unwrap();
    }

    let listed = registry.list(TargetFilter::default()).await.unwrap();
    let participants: Vec<&str> = listed.iter().map(|t| t.participant_id.as_str()).collect();
    assert_eq!(participants, vec!["provider-c", "provider-a", "provider-b"]);

    registry
        .update(
            listed[1].id,
            TargetPatch {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let enabled = registry
        .list(TargetFilter {
            enabled: Some(true),
        })
        .await
        .unwrap();
    assert_eq!(enabled.len(), 2);
    let disabled = registry
        .list(TargetFilter {
            enabled: Some(false),
        })
        .await
        .unwrap();
    assert_eq!(disabled.len(), 1);
    assert_eq!(disabled[0].participant_id, "provider-a");
}

async fn due_respects_eligibility_and_enable<R: TargetRegistry>(registry: &R) {
    let now = Utc::now();
    let a = registry
        .add(new_target("https://a.example.com/dsp", "provider-a", 60))
        .await
        .unwrap();
    let b = registry
        .add(new_target("https://b.example.com/dsp", "provider-b", 60))
        .await
        .unwrap();

    // 新目标立即到期
    assert_eq!(registry.due(now).await.unwrap().len(), 2);

    // 记账把下次可调度时间推到未来
    registry.try_schedule(a.id).await.unwrap();
    registry.mark_in_flight(a.id, now).await.unwrap();
    let outcome = CrawlOutcome::succeeded(a.id, "provider-a".to_string(), ContentDelta::Changed, 5);
    registry
        .record_outcome(a.id, &outcome, now + chrono::Duration::seconds(60))
        .await
        .unwrap();
    let due = registry.due(now).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, b.id);
    assert_eq!(
        registry
            .due(now + chrono::Duration::seconds(120))
            .await
            .unwrap()
            .len(),
        2
    );

    // 禁用目标永不到期
    registry
        .update(
            b.id,
            TargetPatch {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(registry.due(now).await.unwrap().is_empty());
}

async fn try_schedule_is_exclusive<R: TargetRegistry>(registry: &R) {
    let a = registry
        .add(new_target("https://a.example.com/dsp", "provider-a", 60))
        .await
        .unwrap();

    assert!(registry.try_schedule(a.id).await.unwrap());
    assert!(!registry.try_schedule(a.id).await.unwrap());
    registry.mark_in_flight(a.id, Utc::now()).await.unwrap();
    assert!(!registry.try_schedule(a.id).await.unwrap());

    // 未知目标与禁用目标都拿不到调度权
    assert!(!registry.try_schedule(uuid::Uuid::new_v4()).await.unwrap());
    let b = registry
        .add(new_target("https://b.example.com/dsp", "provider-b", 60))
        .await
        .unwrap();
    registry
        .update(
            b.id,
            TargetPatch {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!registry.try_schedule(b.id).await.unwrap());
}

async fn release_returns_to_idle_without_attempt<R: TargetRegistry>(registry: &R) {
    let a = registry
        .add(new_target("https://a.example.com/dsp", "provider-a", 60))
        .await
        .unwrap();
    registry.try_schedule(a.id).await.unwrap();
    registry.release(a.id).await.unwrap();

    let stored = registry.find_by_id(a.id).await.unwrap().unwrap();
    assert_eq!(stored.state, TargetState::Idle);
    assert!(stored.last_attempt_at.is_none());
    assert!(registry.try_schedule(a.id).await.unwrap());

    // 已移除目标的回退是空操作
    registry.release(uuid::Uuid::new_v4()).await.unwrap();
}

async fn record_outcome_commits_bookkeeping<R: TargetRegistry>(registry: &R) {
    let a = registry
        .add(new_target("https://a.example.com/dsp", "provider-a", 60))
        .await
        .unwrap();
    let now = Utc::now();

    // 两次计入健康的失败
    for _ in 0..2 {
        assert!(registry.try_schedule(a.id).await.unwrap());
        registry.mark_in_flight(a.id, now).await.unwrap();
        let outcome =
            CrawlOutcome::failed(a.id, "provider-a".to_string(), CrawlErrorKind::Unreachable, 5);
        registry.record_outcome(a.id, &outcome, now).await.unwrap();
    }
    let stored = registry.find_by_id(a.id).await.unwrap().unwrap();
    assert_eq!(stored.state, TargetState::Idle);
    assert_eq!(stored.consecutive_failures, 2);
    assert!(stored.last_attempt_at.is_some());
    assert!(stored.last_success_at.is_none());

    // 存储故障不计入
    assert!(registry.try_schedule(a.id).await.unwrap());
    registry.mark_in_flight(a.id, now).await.unwrap();
    let outcome = CrawlOutcome::failed(
        a.id,
        "provider-a".to_string(),
        CrawlErrorKind::StoreUnavailable,
        5,
    );
    registry.record_outcome(a.id, &outcome, now).await.unwrap();
    assert_eq!(
        registry
            .find_by_id(a.id)
            .await
            .unwrap()
            .unwrap()
            .consecutive_failures,
        2
    );

    // 成功清零计数并记录成功时间
    assert!(registry.try_schedule(a.id).await.unwrap());
    registry.mark_in_flight(a.id, now).await.unwrap();
    let outcome = CrawlOutcome::succeeded(a.id, "provider-a".to_string(), ContentDelta::Changed, 5);
    registry.record_outcome(a.id, &outcome, now).await.unwrap();
    let stored = registry.find_by_id(a.id).await.unwrap().unwrap();
    assert_eq!(stored.consecutive_failures, 0);
    assert!(stored.last_success_at.is_some());
}

async fn outcome_for_removed_target_is_noop<R: TargetRegistry>(registry: &R) {
    let a = registry
        .add(new_target("https://a.example.com/dsp", "provider-a", 60))
        .await
        .unwrap();
    let now = Utc::now();
    registry.try_schedule(a.id).await.unwrap();
    registry.mark_in_flight(a.id, now).await.unwrap();
    registry.remove(a.id).await.unwrap();

    let outcome = CrawlOutcome::succeeded(a.id, "provider-a".to_string(), ContentDelta::Changed, 5);
    registry.record_outcome(a.id, &outcome, now).await.unwrap();
    assert!(registry.find_by_id(a.id).await.unwrap().is_none());
}

async fn reset_stuck_recovers_abandoned_targets<R: TargetRegistry>(registry: &R) {
    let a = registry
        .add(new_target("https://a.example.com/dsp", "provider-a", 60))
        .await
        .unwrap();
    let b = registry
        .add(new_target("https://b.example.com/dsp", "provider-b", 60))
        .await
        .unwrap();
    registry.try_schedule(a.id).await.unwrap();
    registry.try_schedule(b.id).await.unwrap();
    registry.mark_in_flight(b.id, Utc::now()).await.unwrap();

    // 刚更新过的目标不算滞留
    assert_eq!(
        registry
            .reset_stuck(chrono::Duration::minutes(30))
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        registry.reset_stuck(chrono::Duration::zero()).await.unwrap(),
        2
    );

    for id in [a.id, b.id] {
        let stored = registry.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.state, TargetState::Idle);
        assert!(registry.try_schedule(id).await.unwrap());
    }
}

macro_rules! registry_contract {
    ($module:ident, $make:expr) => {
        mod $module {
            use super::*;

            #[tokio::test]
            async fn add_is_unique_by_url() {
                super::add_is_unique_by_url(&$make.await).await;
            }

            #[tokio::test]
            async fn remove_frees_url() {
                super::remove_frees_url(&$make.await).await;
            }

            #[tokio::test]
            async fn update_patches_and_validates() {
                super::update_patches_and_validates(&$make.await).await;
            }

            #[tokio::test]
            async fn list_follows_registration_order() {
                super::list_follows_registration_order(&$make.await).await;
            }

            #[tokio::test]
            async fn due_respects_eligibility_and_enable() {
                super::due_respects_eligibility_and_enable(&$make.await).await;
            }

            #[tokio::test]
            async fn try_schedule_is_exclusive() {
                super::try_schedule_is_exclusive(&$make.await).await;
            }

            #[tokio::test]
            async fn release_returns_to_idle_without_attempt() {
                super::release_returns_to_idle_without_attempt(&$make.await).await;
            }

            #[tokio::test]
            async fn record_outcome_commits_bookkeeping() {
                super::record_outcome_commits_bookkeeping(&$make.await).await;
            }

            #[tokio::test]
            async fn outcome_for_removed_target_is_noop() {
                super::outcome_for_removed_target_is_noop(&$make.await).await;
            }

            #[tokio::test]
            async fn reset_stuck_recovers_abandoned_targets() {
                super::reset_stuck_recovers_abandoned_targets(&$make.await).await;
            }
        }
    };
}

async fn memory_registry() -> MemoryTargetRegistry {
    MemoryTargetRegistry::new()
}

async fn sql_registry() -> SqlTargetRegistry {
    SqlTargetRegistry::new(sqlite_db().await)
}

registry_contract!(memory_registry_contract, memory_registry());
registry_contract!(sql_registry_contract, sql_registry());
