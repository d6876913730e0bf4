// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::catalog_cache::CatalogCache;
use crate::domain::services::query_service::QueryService;
use crate::presentation::handlers::catalog_handler;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 创建应用路由
///
/// 查询路由挂在任意一种快照缓存之上；参数化缓存类型使同一套
/// 路由既能服务运行时选定的后端，也能在测试里直接套内存实现。
///
/// # 参数
///
/// * `service` - 目录查询服务
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes<C: CatalogCache + 'static>(service: Arc<QueryService<C>>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let catalog_routes = Router::new()
        .route(
            "/v1alpha/catalog/query",
            post(catalog_handler::query_catalog::<C>),
        )
        .route(
            "/v1alpha/catalog/participants",
            get(catalog_handler::list_participants::<C>),
        )
        .route(
            "/v1alpha/catalog/{participant_id}",
            get(catalog_handler::get_catalog::<C>),
        )
        .layer(Extension(service));

    Router::new()
        .merge(public_routes)
        .merge(catalog_routes)
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
///
/// # 返回值
///
/// 返回应用版本号
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
