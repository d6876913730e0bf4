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

use crate::domain::models::target::CrawlTarget;
use crate::engines::traits::{CatalogFetcher, FetchError, RawCatalog};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 协议版本响应头
const VERSION_HEADER: &str = "dspace-version";

/// 凭证提供特质
///
/// 为目标端点提供Authorization头的值。凭证的获取与刷新是提供方
/// 自己的事情，抓取端只负责携带。
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// 返回目标的Authorization头值，None表示匿名访问
    async fn token_for(&self, target: &CrawlTarget) -> Result<Option<String>, FetchError>;
}

/// 固定令牌凭证
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    /// 匿名访问
    pub fn anonymous() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenProvider {
    async fn token_for(&self, _target: &CrawlTarget) -> Result<Option<String>, FetchError> {
        Ok(self.token.clone())
    }
}

/// HTTP基本认证凭证
pub struct BasicAuthProvider {
    encoded: String,
}

impl BasicAuthProvider {
    pub fn new(username: &str, password: &str) -> Self {
        let encoded = BASE64.encode(format!("{}:{}", username, password));
        Self {
            encoded: format!("Basic {}", encoded),
        }
    }
}

#[async_trait]
impl CredentialProvider for BasicAuthProvider {
    async fn token_for(&self, _target: &CrawlTarget) -> Result<Option<String>, FetchError> {
        Ok(Some(self.encoded.clone()))
    }
}

/// 数据空间协议目录客户端
///
/// 向参与方端点POST目录请求消息并取回完整目录文档。每次抓取
/// 构造独立的HTTP客户端，参与方之间不共享连接与凭证状态。
#[derive(Clone)]
pub struct DspCatalogClient {
    request_timeout: Duration,
    credentials: Arc<dyn CredentialProvider>,
}

impl DspCatalogClient {
    /// 创建目录客户端
    ///
    /// # 参数
    ///
    /// * `request_timeout` - 单次HTTP请求的超时
    /// * `credentials` - 凭证提供方
    pub fn new(request_timeout: Duration, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            request_timeout,
            credentials,
        }
    }

    fn request_message() -> Value {
        json!({
            "@context": {"dspace": "https://w3id.org/dspace/v0.8/"},
            "@type": "dspace:CatalogRequestMessage",
        })
    }
}

#[async_trait]
impl CatalogFetcher for DspCatalogClient {
    /// 抓取目标的目录文档
    ///
    /// # 参数
    ///
    /// * `target` - 抓取目标
    ///
    /// # 返回值
    ///
    /// * `Ok(RawCatalog)` - 原始目录与实际协议版本
    /// * `Err(FetchError)` - 传输失败、超时或凭证被拒
    async fn fetch(&self, target: &CrawlTarget) -> Result<RawCatalog, FetchError> {
        let token = self.credentials.token_for(target).await?;
        let endpoint = format!("{}/catalog/request", target.url.trim_end_matches('/'));

        let client = reqwest::Client::builder()
            .user_agent(concat!("fedcatrs/", env!("CARGO_PKG_VERSION")))
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| FetchError::Unreachable(format!("client build failed: {}", e)))?;

        let mut request = client.post(&endpoint).json(&Self::request_message());
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::AuthRejected(format!(
                "endpoint returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(FetchError::Unreachable(format!(
                "unexpected status {}",
                status
            )));
        }

        let protocol_version = response
            .headers()
            .get(VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(&target.protocol_version)
            .to_string();

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Unreachable(format!("failed to read body: {}", e)))?;
        // 非JSON响应原样下传，由规整阶段判为无效文档
        let document =
            serde_json::from_str(&body).unwrap_or_else(|_| Value::String(body.clone()));

        debug!(
            participant_id = %target.participant_id,
            endpoint = %endpoint,
            protocol_version = %protocol_version,
            "catalog document fetched"
        );
        Ok(RawCatalog {
            document,
            protocol_version,
        })
    }
}

#[cfg(test)]
#[path = "dsp_client_test.rs"]
mod tests;
