// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// 目录条目
///
/// 一个资产描述与其使用策略的配对。资产与策略对本系统是
/// 不透明的JSON，按原样缓存与查询。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    /// 条目标识，在所属快照内唯一
    pub id: String,
    /// 资产描述
    pub asset: serde_json::Value,
    /// 使用策略
    pub policy: serde_json::Value,
}

/// 目录快照
///
/// 一个参与方目录在某次成功抓取时的不可变快照。快照整体替换，
/// 从不部分修补；`content_hash`对条目顺序不敏感，用于变更检测。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// 参与方标识，缓存中的键
    pub participant_id: String,
    /// 目录条目，保持文档顺序
    pub offers: Vec<Offer>,
    /// 顺序无关的内容哈希
    pub content_hash: String,
    /// 抓取时使用的协议版本
    pub protocol_version: String,
    /// 抓取时间
    pub fetched_at: DateTime<FixedOffset>,
}

impl CatalogSnapshot {
    /// 判断快照内容是否与给定哈希一致
    pub fn same_content(&self, hash: &str) -> bool {
        self.content_hash == hash
    }
}

/// 查询命中的条目及其归属
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferRecord {
    /// 条目来源的参与方标识
    pub participant_id: String,
    /// 命中的条目
    pub offer: Offer,
}
