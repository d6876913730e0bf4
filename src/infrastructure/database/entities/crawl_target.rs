// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "crawl_targets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub url: String,
    pub participant_id: String,
    pub protocol_version: String,
    pub interval_secs: i64,
    pub enabled: bool,
    pub state: String,
    pub consecutive_failures: i32,
    pub last_attempt_at: Option<ChronoDateTimeWithTimeZone>,
    pub last_success_at: Option<ChronoDateTimeWithTimeZone>,
    pub next_eligible_at: Option<ChronoDateTimeWithTimeZone>,
    pub seq: i64,
    pub created_at: ChronoDateTimeWithTimeZone,
    pub updated_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
