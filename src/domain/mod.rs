// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：抓取目标、目录快照与尝试结论
/// - 查询模型（query）：跨快照的条目过滤与排序
/// - 仓库接口（repositories）：注册表与缓存的抽象契约
/// - 服务（services）：目录规整与只读查询门面
///
/// 领域层是系统的核心，不依赖于任何外部实现，
/// 体现了纯粹的业务逻辑和业务规则。
pub mod models;
pub mod query;
pub mod repositories;
pub mod services;
