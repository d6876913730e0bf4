// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::catalog_query_request::{
    CatalogQueryRequestDto, CatalogQueryResponseDto, ParticipantsResponseDto,
};
use crate::domain::models::snapshot::CatalogSnapshot;
use crate::domain::query::OfferQuery;
use crate::domain::repositories::catalog_cache::CatalogCache;
use crate::domain::services::query_service::QueryService;
use crate::presentation::errors::AppError;
use anyhow;
use axum::{
    extract::{Extension, Path},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use validator::Validate;

/// 从请求头解析调用方声明
///
/// `x-claims`头携带一个JSON对象；缺省按空声明处理，无法解析的
/// 内容按错误请求拒绝。
///
/// # 参数
///
/// * `headers` - 请求头集合
///
/// # 返回值
///
/// * `Ok(Value)` - 声明JSON对象
/// * `Err(AppError)` - 头内容不是合法JSON
fn claims_from_headers(headers: &HeaderMap) -> Result<serde_json::Value, AppError> {
    let Some(value) = headers.get("x-claims") else {
        return Ok(serde_json::json!({}));
    };

    let raw = value
        .to_str()
        .map_err(|_| anyhow::anyhow!("invalid x-claims header: not valid UTF-8"))?;
    let claims: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| anyhow::anyhow!("invalid x-claims header: {}", e))?;
    Ok(claims)
}

/// 目录条目查询处理器
///
/// 对缓存中全部参与方的快照执行条件查询，再按调用方声明做访问
/// 裁决，返回命中条目与数量。
pub async fn query_catalog<C: CatalogCache + 'static>(
    Extension(service): Extension<Arc<QueryService<C>>>,
    headers: HeaderMap,
    Json(request): Json<CatalogQueryRequestDto>,
) -> Result<Json<CatalogQueryResponseDto>, AppError> {
    let start_time = Instant::now();

    // 验证请求参数
    if let Err(errors) = request.validate() {
        return Err(AppError::from(anyhow::anyhow!(
            "Validation error: {:?}",
            errors
        )));
    }

    let claims = claims_from_headers(&headers)?;
    let query = OfferQuery::from(request);

    let offers = service.offers(&query, &claims).await?;

    info!(
        count = offers.len(),
        response_time_ms = start_time.elapsed().as_millis() as u64,
        "Catalog query served"
    );

    Ok(Json(CatalogQueryResponseDto {
        count: offers.len(),
        offers,
    }))
}

/// 参与方清单处理器
pub async fn list_participants<C: CatalogCache + 'static>(
    Extension(service): Extension<Arc<QueryService<C>>>,
) -> Result<Json<ParticipantsResponseDto>, AppError> {
    let participants = service.participants().await?;

    Ok(Json(ParticipantsResponseDto {
        count: participants.len(),
        participants,
    }))
}

/// 单参与方快照处理器
///
/// 返回该参与方最近一次成功抓取的完整快照；缓存未持有该参与方
/// 时返回404。
pub async fn get_catalog<C: CatalogCache + 'static>(
    Extension(service): Extension<Arc<QueryService<C>>>,
    Path(participant_id): Path<String>,
) -> Result<Json<CatalogSnapshot>, AppError> {
    match service.catalog(&participant_id).await? {
        Some(snapshot) => Ok(Json(snapshot)),
        None => Err(AppError::from(anyhow::anyhow!(
            "Catalog for participant '{}' not found",
            participant_id
        ))),
    }
}
