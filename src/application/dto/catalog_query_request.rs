// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::snapshot::OfferRecord;
use crate::domain::query::{Criterion, OfferQuery, SortSpec};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 目录查询请求DTO
///
/// 外部查询入口的请求体。省略的字段按查询模型的默认值处理，
/// 调用方声明不在请求体里，由`x-claims`头携带。
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CatalogQueryRequestDto {
    /// 过滤条件，按与连接
    #[validate(length(max = 64))]
    pub criteria: Option<Vec<Criterion>>,

    /// 限定的参与方，空或省略表示全部
    pub participant_ids: Option<Vec<String>>,

    /// 排序说明
    pub sort: Option<SortSpec>,

    /// 返回条数上限（默认 50，0 表示不限）
    #[validate(range(max = 1000))]
    pub limit: Option<u64>,

    /// 跳过条数
    pub offset: Option<u64>,
}

impl Default for CatalogQueryRequestDto {
    fn default() -> Self {
        Self {
            criteria: None,
            participant_ids: None,
            sort: None,
            limit: Some(50),
            offset: Some(0),
        }
    }
}

impl From<CatalogQueryRequestDto> for OfferQuery {
    fn from(dto: CatalogQueryRequestDto) -> Self {
        let defaults = OfferQuery::default();
        OfferQuery {
            criteria: dto.criteria.unwrap_or_default(),
            participant_ids: dto.participant_ids.unwrap_or_default(),
            sort: dto.sort,
            limit: dto.limit.unwrap_or(defaults.limit),
            offset: dto.offset.unwrap_or_default(),
        }
    }
}

/// 目录查询响应DTO
#[derive(Debug, Serialize)]
pub struct CatalogQueryResponseDto {
    pub offers: Vec<OfferRecord>,
    pub count: usize,
}

/// 参与方清单响应DTO
#[derive(Debug, Serialize)]
pub struct ParticipantsResponseDto {
    pub participants: Vec<String>,
    pub count: usize,
}
