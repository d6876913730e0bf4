// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 抓取目标（target）：参与方目录端点及其调度状态机与健康记录
/// - 目录快照（snapshot）：一次成功抓取固化下来的参与方目录
/// - 尝试结论（outcome）：单次抓取尝试的结果与失败分类
///
/// 这些模型构成了系统的数据基础，定义了业务概念的
/// 结构和行为，是领域驱动设计的核心组成部分。
pub mod outcome;
pub mod snapshot;
pub mod target;
