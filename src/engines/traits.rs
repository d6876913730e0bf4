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

use crate::domain::models::outcome::CrawlErrorKind;
use crate::domain::models::target::CrawlTarget;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// 抓取错误类型
#[derive(Error, Debug)]
pub enum FetchError {
    /// 请求超时
    #[error("Fetch timed out")]
    Timeout,
    /// 端点不可达或返回非预期状态
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),
    /// 凭证被端点拒绝
    #[error("Credentials rejected: {0}")]
    AuthRejected(String),
}

impl FetchError {
    /// 映射为抓取结论的失败分类
    pub fn kind(&self) -> CrawlErrorKind {
        match self {
            FetchError::Timeout => CrawlErrorKind::Timeout,
            FetchError::Unreachable(_) => CrawlErrorKind::Unreachable,
            FetchError::AuthRejected(_) => CrawlErrorKind::AuthRejected,
        }
    }
}

/// 原始目录文档
///
/// 抓取端返回的未规整目录及其实际协商出的协议版本。
#[derive(Debug, Clone)]
pub struct RawCatalog {
    /// 目录JSON文档
    pub document: serde_json::Value,
    /// 端点实际使用的协议版本
    pub protocol_version: String,
}

/// 目录抓取特质
///
/// 抓取一个目标端点的完整目录文档。实现负责协议细节与自身的
/// 请求超时；调用方在外层另行施加整次尝试的超时并在超时后丢弃
/// 在途请求。
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    /// 抓取目标的目录文档
    async fn fetch(&self, target: &CrawlTarget) -> Result<RawCatalog, FetchError>;
}

#[async_trait]
impl<T: CatalogFetcher + ?Sized> CatalogFetcher for Arc<T> {
    async fn fetch(&self, target: &CrawlTarget) -> Result<RawCatalog, FetchError> {
        (**self).fetch(target).await
    }
}
