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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 应用程序配置设置
///
/// 包含服务器、数据库、Redis、后端选择、爬取与抓取等所有配置项
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// 服务器配置
    pub server: ServerSettings,
    /// 数据库配置
    pub database: DatabaseSettings,
    /// Redis配置
    pub redis: RedisSettings,
    /// 注册表后端选择
    pub registry: RegistrySettings,
    /// 缓存后端选择
    pub cache: CacheSettings,
    /// 爬取调度配置
    pub crawler: CrawlerSettings,
    /// 目录抓取配置
    pub fetcher: FetcherSettings,
}

/// 服务器配置设置
#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
    /// Prometheus指标导出端口
    pub metrics_port: u16,
}

/// 数据库配置设置
#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 连接超时时间（秒）
    pub connect_timeout_secs: u64,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 是否记录SQL语句
    pub sqlx_logging: bool,
}

/// Redis配置设置
#[derive(Debug, Deserialize)]
pub struct RedisSettings {
    /// Redis连接URL
    pub url: String,
}

/// 注册表后端枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    /// SeaORM持久化注册表
    Sql,
    /// 进程内注册表
    Memory,
}

/// 注册表后端选择
#[derive(Debug, Deserialize)]
pub struct RegistrySettings {
    /// 后端类型
    pub backend: RegistryBackend,
}

/// 缓存后端枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// SeaORM持久化缓存
    Sql,
    /// Redis缓存
    Redis,
    /// 进程内缓存
    Memory,
}

/// 缓存后端选择
#[derive(Debug, Deserialize)]
pub struct CacheSettings {
    /// 后端类型
    pub backend: CacheBackend,
}

/// 爬取调度配置设置
#[derive(Debug, Deserialize)]
pub struct CrawlerSettings {
    /// 启动后首轮调度前的延迟（秒）
    pub execution_delay_secs: u64,
    /// 调度轮询周期（秒）
    pub tick_secs: u64,
    /// 同时在途的抓取尝试上限
    pub concurrency: usize,
    /// 单次尝试的硬超时（秒）
    pub attempt_timeout_secs: u64,
    /// 触发退避的连续失败阈值
    pub failure_threshold: u32,
    /// 退避后的最大间隔（秒）
    pub backoff_max_interval_secs: u64,
    /// 关闭时等待在途尝试的宽限期（秒）
    pub shutdown_grace_secs: u64,
}

/// 目录抓取配置设置
#[derive(Debug, Deserialize)]
pub struct FetcherSettings {
    /// 单个目录请求的超时（秒）
    pub request_timeout_secs: u64,
    /// 静态Bearer令牌（可选）
    pub auth_token: Option<String>,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("RUN_MODE").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Start with default settings
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.metrics_port", 9000)?
            // Default DB pool settings
            .set_default("database.url", "sqlite::memory:")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.connect_timeout_secs", 10)?
            .set_default("database.acquire_timeout_secs", 10)?
            .set_default("database.idle_timeout_secs", 300)?
            .set_default("database.sqlx_logging", false)?
            // Default Redis settings
            .set_default("redis.url", "redis://127.0.0.1:6379")?
            // Default backend selection
            .set_default("registry.backend", "memory")?
            .set_default("cache.backend", "memory")?
            // Default crawler settings
            .set_default("crawler.execution_delay_secs", 5)?
            .set_default("crawler.tick_secs", 20)?
            .set_default("crawler.concurrency", 10)?
            .set_default("crawler.attempt_timeout_secs", 30)?
            .set_default("crawler.failure_threshold", 5)?
            .set_default("crawler.backoff_max_interval_secs", 3600)?
            .set_default("crawler.shutdown_grace_secs", 15)?
            // Default fetcher settings
            .set_default("fetcher.request_timeout_secs", 20)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("FEDCATRS").separator("__"));

        builder.build()?.try_deserialize()
    }
}
