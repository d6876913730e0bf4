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

use crate::domain::models::snapshot::{CatalogSnapshot, Offer, OfferRecord};
use crate::domain::query::{self, OfferQuery};
use crate::domain::repositories::catalog_cache::{CacheError, CatalogCache};
use crate::infrastructure::database::entities::catalog_snapshot as snapshot_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;

/// SQL目录缓存
///
/// 快照按参与方整行存储，条目序列化为JSON列。单键写入在事务内
/// 完成，读者不会观察到半写行。
#[derive(Clone)]
pub struct SqlCatalogCache {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl SqlCatalogCache {
    /// 创建新的缓存实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn map_db_err(err: DbErr) -> CacheError {
    match err {
        DbErr::Conn(e) => CacheError::Unavailable(e.to_string()),
        DbErr::ConnectionAcquire(e) => CacheError::Unavailable(e.to_string()),
        other => CacheError::Backend(other.to_string()),
    }
}

impl From<snapshot_entity::Model> for CatalogSnapshot {
    fn from(model: snapshot_entity::Model) -> Self {
        Self {
            participant_id: model.participant_id,
            offers: serde_json::from_value::<Vec<Offer>>(model.offers).unwrap_or_default(),
            content_hash: model.content_hash,
            protocol_version: model.protocol_version,
            fetched_at: model.fetched_at,
        }
    }
}

#[async_trait]
impl CatalogCache for SqlCatalogCache {
    async fn put(&self, snapshot: &CatalogSnapshot) -> Result<(), CacheError> {
        let offers = serde_json::to_value(&snapshot.offers)
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        let now: DateTime<FixedOffset> = Utc::now().into();

        let txn = self.db.begin().await.map_err(map_db_err)?;

        let existing = snapshot_entity::Entity::find_by_id(snapshot.participant_id.clone())
            .one(&txn)
            .await
            .map_err(map_db_err)?;

        match existing {
            Some(_) => {
                let active = snapshot_entity::ActiveModel {
                    participant_id: Set(snapshot.participant_id.clone()),
                    offers: Set(offers),
                    content_hash: Set(snapshot.content_hash.clone()),
                    protocol_version: Set(snapshot.protocol_version.clone()),
                    fetched_at: Set(snapshot.fetched_at),
                    updated_at: Set(now),
                    ..Default::default()
                };
                active.update(&txn).await.map_err(map_db_err)?;
            }
            None => {
                let active = snapshot_entity::ActiveModel {
                    participant_id: Set(snapshot.participant_id.clone()),
                    offers: Set(offers),
                    content_hash: Set(snapshot.content_hash.clone()),
                    protocol_version: Set(snapshot.protocol_version.clone()),
                    fetched_at: Set(snapshot.fetched_at),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                active.insert(&txn).await.map_err(map_db_err)?;
            }
        }

        txn.commit().await.map_err(map_db_err)?;
        Ok(())
    }

    async fn get(&self, participant_id: &str) -> Result<Option<CatalogSnapshot>, CacheError> {
        let model = snapshot_entity::Entity::find_by_id(participant_id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)?;
        Ok(model.map(Into::into))
    }

    async fn query(&self, offer_query: &OfferQuery) -> Result<Vec<OfferRecord>, CacheError> {
        let mut select = snapshot_entity::Entity::find();
        if !offer_query.participant_ids.is_empty() {
            select = select.filter(
                snapshot_entity::Column::ParticipantId.is_in(offer_query.participant_ids.clone()),
            );
        }
        let models = select.all(self.db.as_ref()).await.map_err(map_db_err)?;

        let records: Vec<OfferRecord> = models
            .into_iter()
            .map(CatalogSnapshot::from)
            .flat_map(|snapshot| {
                let participant_id = snapshot.participant_id.clone();
                snapshot.offers.into_iter().map(move |offer| OfferRecord {
                    participant_id: participant_id.clone(),
                    offer,
                })
            })
            .collect();

        Ok(query::apply(records, offer_query))
    }

    async fn delete(&self, participant_id: &str) -> Result<(), CacheError> {
        snapshot_entity::Entity::delete_by_id(participant_id.to_string())
            .exec(self.db.as_ref())
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    async fn participant_ids(&self) -> Result<Vec<String>, CacheError> {
        let ids = snapshot_entity::Entity::find()
            .select_only()
            .column(snapshot_entity::Column::ParticipantId)
            .order_by_asc(snapshot_entity::Column::ParticipantId)
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;
        Ok(ids)
    }
}
