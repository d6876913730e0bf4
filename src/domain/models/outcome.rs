// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 单次抓取尝试的结论
///
/// 由抓取单元在尝试结束时生成，注册表据此一次性提交健康记账
/// 并把目标落回Idle。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlOutcome {
    /// 目标标识
    pub target_id: Uuid,
    /// 参与方标识
    pub participant_id: String,
    /// 本次尝试是否成功
    pub success: bool,
    /// 失败原因，成功时为None
    pub error: Option<CrawlErrorKind>,
    /// 内容变更判定，失败时为None
    pub delta: Option<ContentDelta>,
    /// 尝试耗时（毫秒）
    pub duration_ms: u64,
}

impl CrawlOutcome {
    /// 构造成功结论
    pub fn succeeded(
        target_id: Uuid,
        participant_id: String,
        delta: ContentDelta,
        duration_ms: u64,
    ) -> Self {
        Self {
            target_id,
            participant_id,
            success: true,
            error: None,
            delta: Some(delta),
            duration_ms,
        }
    }

    /// 构造失败结论
    pub fn failed(
        target_id: Uuid,
        participant_id: String,
        error: CrawlErrorKind,
        duration_ms: u64,
    ) -> Self {
        Self {
            target_id,
            participant_id,
            success: false,
            error: Some(error),
            delta: None,
            duration_ms,
        }
    }

    /// 本次失败是否计入目标的连续失败计数
    ///
    /// 存储不可用是系统性故障，不属于目标自身的健康问题。
    pub fn counts_against_target(&self) -> bool {
        !matches!(self.error, Some(CrawlErrorKind::StoreUnavailable))
    }
}

/// 内容变更判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentDelta {
    /// 内容哈希与缓存不同，已写入新快照（首次成功抓取也视为变更）
    Changed,
    /// 内容哈希与缓存一致，本次未写入
    Unchanged,
}

/// 抓取失败分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlErrorKind {
    /// 尝试超时，在途请求已被取消
    Timeout,
    /// 端点不可达或返回非预期状态
    Unreachable,
    /// 凭证被端点拒绝
    AuthRejected,
    /// 目录文档不符合约定形状
    MalformedCatalog,
    /// 目录声明了不支持的协议版本
    UnsupportedProtocolVersion,
    /// 快照存储不可用，系统性故障
    StoreUnavailable,
}

impl fmt::Display for CrawlErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CrawlErrorKind::Timeout => write!(f, "timeout"),
            CrawlErrorKind::Unreachable => write!(f, "unreachable"),
            CrawlErrorKind::AuthRejected => write!(f, "auth_rejected"),
            CrawlErrorKind::MalformedCatalog => write!(f, "malformed_catalog"),
            CrawlErrorKind::UnsupportedProtocolVersion => {
                write!(f, "unsupported_protocol_version")
            }
            CrawlErrorKind::StoreUnavailable => write!(f, "store_unavailable"),
        }
    }
}
