// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// 爬取目标实体
///
/// 表示联邦目录中一个参与方的协议端点。每个目标携带自己的
/// 抓取周期、启用开关和健康记录（连续失败次数、最近尝试与
/// 最近成功时间）。同一目标在任意时刻最多只有一次在途抓取，
/// 由状态机的原子转换保证。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlTarget {
    /// 目标唯一标识符
    pub id: Uuid,
    /// 展示名称
    pub name: String,
    /// 参与方目录端点URL，注册表内唯一
    pub url: String,
    /// 参与方标识，快照在缓存中的键
    pub participant_id: String,
    /// 目录协议版本
    pub protocol_version: String,
    /// 抓取周期（秒），必须大于零
    pub interval_secs: i64,
    /// 是否参与调度
    pub enabled: bool,
    /// 调度状态，跟踪目标在抓取生命周期中的当前阶段
    pub state: TargetState,
    /// 连续失败次数，成功后清零
    pub consecutive_failures: i32,
    /// 最近一次尝试时间
    pub last_attempt_at: Option<DateTime<FixedOffset>>,
    /// 最近一次成功时间
    pub last_success_at: Option<DateTime<FixedOffset>>,
    /// 下次可调度时间，None表示立即可调度
    pub next_eligible_at: Option<DateTime<FixedOffset>>,
    /// 注册顺序，列表按此排序
    pub seq: i64,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
}

/// 新目标的注册参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTarget {
    /// 展示名称
    pub name: String,
    /// 参与方目录端点URL
    pub url: String,
    /// 参与方标识
    pub participant_id: String,
    /// 目录协议版本
    pub protocol_version: String,
    /// 抓取周期（秒）
    pub interval_secs: i64,
}

/// 目标部分更新
///
/// 只允许修改名称、抓取周期和启用开关。对调度的影响从下一个
/// 调度周期开始生效，不会打断在途抓取。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetPatch {
    /// 新的展示名称
    pub name: Option<String>,
    /// 新的抓取周期（秒）
    pub interval_secs: Option<i64>,
    /// 新的启用开关
    pub enabled: Option<bool>,
}

/// 目标调度状态枚举
///
/// 状态转换遵循以下流程：
/// Idle → Scheduled → InFlight → Succeeded/Failed → Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    /// 空闲，等待到达下次可调度时间
    #[default]
    Idle,
    /// 已调度，本轮已被选中但抓取尚未开始
    Scheduled,
    /// 在途，抓取正在执行
    InFlight,
    /// 本次尝试成功，等待记账落盘
    Succeeded,
    /// 本次尝试失败，等待记账落盘
    Failed,
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TargetState::Idle => write!(f, "idle"),
            TargetState::Scheduled => write!(f, "scheduled"),
            TargetState::InFlight => write!(f, "in_flight"),
            TargetState::Succeeded => write!(f, "succeeded"),
            TargetState::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TargetState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(TargetState::Idle),
            "scheduled" => Ok(TargetState::Scheduled),
            "in_flight" => Ok(TargetState::InFlight),
            "succeeded" => Ok(TargetState::Succeeded),
            "failed" => Ok(TargetState::Failed),
            _ => Err(()),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 无效的状态转换，当目标状态转换不符合调度规则时发生
    #[error("Invalid state transition")]
    InvalidStateTransition,

    /// 验证错误，当输入数据不符合领域规则时发生
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl CrawlTarget {
    /// 从注册参数创建一个新目标
    ///
    /// 新目标处于Idle状态且立即可调度。`seq`由注册表在落盘时
    /// 分配，这里以零占位。
    ///
    /// # 参数
    ///
    /// * `new` - 注册参数
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlTarget)` - 新创建的目标
    /// * `Err(DomainError)` - 参数不符合领域规则
    pub fn try_new(new: NewTarget) -> Result<Self, DomainError> {
        let parsed = url::Url::parse(&new.url)
            .map_err(|e| DomainError::ValidationError(format!("invalid target url: {}", e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(DomainError::ValidationError(format!(
                "unsupported url scheme: {}",
                parsed.scheme()
            )));
        }
        if new.interval_secs <= 0 {
            return Err(DomainError::ValidationError(
                "interval_secs must be positive".to_string(),
            ));
        }
        if new.participant_id.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "participant_id must not be empty".to_string(),
            ));
        }
        let now: DateTime<FixedOffset> = Utc::now().into();
        Ok(Self {
            id: Uuid::new_v4(),
            name: new.name,
            url: new.url,
            participant_id: new.participant_id,
            protocol_version: new.protocol_version,
            interval_secs: new.interval_secs,
            enabled: true,
            state: TargetState::Idle,
            consecutive_failures: 0,
            last_attempt_at: None,
            last_success_at: None,
            next_eligible_at: None,
            seq: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// 调度目标
    ///
    /// 将目标状态从Idle变更为Scheduled。禁用的目标不可调度。
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlTarget)` - 已调度的目标
    /// * `Err(DomainError)` - 状态转换失败
    pub fn schedule(mut self) -> Result<Self, DomainError> {
        match self.state {
            TargetState::Idle if self.enabled => {
                self.state = TargetState::Scheduled;
                self.updated_at = Utc::now().into();
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 开始抓取尝试
    ///
    /// 将目标状态从Scheduled变更为InFlight并记录尝试时间。
    ///
    /// # 参数
    ///
    /// * `now` - 尝试开始时间
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlTarget)` - 在途的目标
    /// * `Err(DomainError)` - 状态转换失败
    pub fn begin_attempt(mut self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            TargetState::Scheduled => {
                self.state = TargetState::InFlight;
                self.last_attempt_at = Some(now.into());
                self.updated_at = now.into();
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 标记本次尝试成功
    ///
    /// 将目标状态从InFlight变更为Succeeded，记录成功时间并清零
    /// 连续失败计数。
    ///
    /// # 参数
    ///
    /// * `now` - 成功时间
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlTarget)` - 成功的目标
    /// * `Err(DomainError)` - 状态转换失败
    pub fn succeed(mut self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            TargetState::InFlight => {
                self.state = TargetState::Succeeded;
                self.last_success_at = Some(now.into());
                self.consecutive_failures = 0;
                self.updated_at = now.into();
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 标记本次尝试失败
    ///
    /// 将目标状态从InFlight变更为Failed。`counts`为false时不累加
    /// 连续失败计数，用于存储不可用这类系统性故障。
    ///
    /// # 参数
    ///
    /// * `counts` - 本次失败是否计入目标健康记录
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlTarget)` - 失败的目标
    /// * `Err(DomainError)` - 状态转换失败
    pub fn fail(mut self, counts: bool) -> Result<Self, DomainError> {
        match self.state {
            TargetState::InFlight => {
                self.state = TargetState::Failed;
                if counts {
                    self.consecutive_failures += 1;
                }
                self.updated_at = Utc::now().into();
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 落定本次尝试
    ///
    /// 将目标状态从Succeeded或Failed变回Idle并记录下次可调度
    /// 时间。记账提交后目标重新参与调度。
    ///
    /// # 参数
    ///
    /// * `next_eligible_at` - 下次可调度时间
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlTarget)` - 空闲的目标
    /// * `Err(DomainError)` - 状态转换失败
    pub fn settle(mut self, next_eligible_at: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            TargetState::Succeeded | TargetState::Failed => {
                self.state = TargetState::Idle;
                self.next_eligible_at = Some(next_eligible_at.into());
                self.updated_at = Utc::now().into();
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 回退调度
    ///
    /// 将目标状态从Scheduled变回Idle，用于派发背压时的让位。
    /// 不记录尝试，目标在下一轮重新参与调度。
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlTarget)` - 空闲的目标
    /// * `Err(DomainError)` - 状态转换失败
    pub fn release(mut self) -> Result<Self, DomainError> {
        match self.state {
            TargetState::Scheduled => {
                self.state = TargetState::Idle;
                self.updated_at = Utc::now().into();
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 判断目标当前是否到期可抓
    ///
    /// # 参数
    ///
    /// * `now` - 当前时间
    ///
    /// # 返回值
    ///
    /// 启用、空闲且已到达下次可调度时间则返回true
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && self.state == TargetState::Idle
            && self
                .next_eligible_at
                .map(|t| t <= now)
                .unwrap_or(true)
    }

    /// 应用部分更新
    ///
    /// # 参数
    ///
    /// * `patch` - 要应用的字段
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlTarget)` - 更新后的目标
    /// * `Err(DomainError)` - 更新值不符合领域规则
    pub fn apply_patch(mut self, patch: TargetPatch) -> Result<Self, DomainError> {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(interval) = patch.interval_secs {
            if interval <= 0 {
                return Err(DomainError::ValidationError(
                    "interval_secs must be positive".to_string(),
                ));
            }
            self.interval_secs = interval;
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        self.updated_at = Utc::now().into();
        Ok(self)
    }
}
