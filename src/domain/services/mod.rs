// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 该模块包含系统的核心业务逻辑服务，这些服务封装了复杂的
/// 业务规则和领域逻辑，协调多个领域对象来完成业务操作。
///
/// 包含的服务：
/// - 规整服务（normalizer）：把原始目录文档转换为确定性的快照与内容哈希
/// - 查询服务（query_service）：缓存之上的只读查询门面与访问裁决
pub mod normalizer;
pub mod query_service;

pub use normalizer::CatalogNormalizer;
pub use query_service::{AllowAllPolicy, OfferPolicy, QueryService};
