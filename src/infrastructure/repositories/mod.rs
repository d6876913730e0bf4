// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 提供注册表与目录缓存接口的具体实现
/// 内存实现供单进程部署与测试，SQL与Redis实现供持久化部署
pub mod memory_catalog_cache;
pub mod memory_target_registry;
pub mod redis_catalog_cache;
pub mod sql_catalog_cache;
pub mod sql_target_registry;

pub use memory_catalog_cache::MemoryCatalogCache;
pub use memory_target_registry::MemoryTargetRegistry;
pub use redis_catalog_cache::RedisCatalogCache;
pub use sql_catalog_cache::SqlCatalogCache;
pub use sql_target_registry::SqlTargetRegistry;
