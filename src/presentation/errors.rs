// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::domain::repositories::catalog_cache::CacheError;
use crate::domain::services::query_service::QueryError;

/// 应用错误类型
///
/// 封装所有可能的应用层错误，提供统一的错误处理接口
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_message = self.0.to_string();

        let status = match self.0.downcast_ref::<QueryError>() {
            Some(QueryError::Cache(CacheError::Unavailable(_))) => StatusCode::SERVICE_UNAVAILABLE,
            Some(QueryError::Cache(CacheError::Backend(_))) => StatusCode::INTERNAL_SERVER_ERROR,
            None => {
                // 检查是否为未命中或验证错误（包含特定关键词）
                if error_message.contains("not found") {
                    StatusCode::NOT_FOUND
                } else if error_message.contains("Validation error")
                    || error_message.contains("cannot be empty")
                    || error_message.contains("invalid")
                    || error_message.contains("required")
                {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        };

        if status.is_server_error() {
            error!(status = %status, "Request failed: {}", error_message);
        }

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
