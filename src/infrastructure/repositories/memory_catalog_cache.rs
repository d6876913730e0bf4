// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::snapshot::{CatalogSnapshot, OfferRecord};
use crate::domain::query::{self, OfferQuery};
use crate::domain::repositories::catalog_cache::{CacheError, CatalogCache};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// 内存目录缓存
///
/// 进程内实现，供单进程部署与测试使用。写入计数器暴露给测试，
/// 用于验证内容未变化时跳过写入。
#[derive(Default)]
pub struct MemoryCatalogCache {
    snapshots: RwLock<HashMap<String, CatalogSnapshot>>,
    puts: AtomicU64,
}

impl MemoryCatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累计写入次数
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogCache for MemoryCatalogCache {
    async fn put(&self, snapshot: &CatalogSnapshot) -> Result<(), CacheError> {
        self.snapshots
            .write()
            .insert(snapshot.participant_id.clone(), snapshot.clone());
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, participant_id: &str) -> Result<Option<CatalogSnapshot>, CacheError> {
        Ok(self.snapshots.read().get(participant_id).cloned())
    }

    async fn query(&self, query: &OfferQuery) -> Result<Vec<OfferRecord>, CacheError> {
        let records: Vec<OfferRecord> = self
            .snapshots
            .read()
            .values()
            .flat_map(|snapshot| {
                snapshot.offers.iter().map(|offer| OfferRecord {
                    participant_id: snapshot.participant_id.clone(),
                    offer: offer.clone(),
                })
            })
            .collect();
        Ok(query::apply(records, query))
    }

    async fn delete(&self, participant_id: &str) -> Result<(), CacheError> {
        self.snapshots.write().remove(participant_id);
        Ok(())
    }

    async fn participant_ids(&self) -> Result<Vec<String>, CacheError> {
        let mut ids: Vec<String> = self.snapshots.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
