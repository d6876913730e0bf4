// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 爬取模块
///
/// 提供目录抓取的调度与执行
/// 包括调度引擎、抓取单元、退避策略与存储保护
pub mod backoff;
pub mod engine;
pub mod manager;
pub mod store_guard;
pub mod worker;

pub use backoff::BackoffPolicy;
pub use engine::CrawlerEngine;
pub use manager::CrawlerManager;
pub use store_guard::{StoreGuard, StoreGuardConfig};
pub use worker::CrawlWorker;
