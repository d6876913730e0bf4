// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{counter, gauge};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// 存储保护配置
#[derive(Clone, Debug)]
pub struct StoreGuardConfig {
    /// 打开保护的失败阈值
    pub failure_threshold: u32,
    /// 恢复探测前的等待时间
    pub recovery_timeout: Duration,
    /// 失败计数的时间窗口
    pub failure_window: Duration,
}

impl Default for StoreGuardConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            failure_window: Duration::from_secs(60),
        }
    }
}

/// 保护状态枚举
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Status {
    /// 关闭，写入正常放行
    Closed,
    /// 打开，写入被挂起
    Open,
    /// 半开，放行单次探测写入
    HalfOpen,
}

/// 保护统计信息
#[derive(Clone, Debug, Default)]
pub struct GuardStats {
    /// 是否处于打开状态
    pub is_open: bool,
    /// 时间窗口内的失败次数
    pub failure_count: u32,
    /// 总写入次数
    pub total_puts: u64,
    /// 总失败次数
    pub total_failures: u64,
}

struct GuardState {
    status: Status,
    failure_timestamps: VecDeque<Instant>,
    last_failure: Option<Instant>,
    probing: bool,
    total_puts: u64,
    total_failures: u64,
}

/// 快照存储保护
///
/// 缓存写入路径上的熔断器。存储连续失败达到阈值后打开，期间
/// 引擎挂起派发、抓取单元不再触碰存储；恢复等待结束后放行一次
/// 探测写入，探测成功关闭保护，失败则重新打开。存储不可用由此
/// 与单个目标的健康记录隔离开。
pub struct StoreGuard {
    backend: String,
    config: StoreGuardConfig,
    state: Mutex<GuardState>,
}

impl StoreGuard {
    /// 创建存储保护
    ///
    /// # 参数
    ///
    /// * `backend` - 后端名称，用于指标标签
    /// * `config` - 保护配置
    pub fn new(backend: &str, config: StoreGuardConfig) -> Self {
        Self {
            backend: backend.to_string(),
            config,
            state: Mutex::new(GuardState {
                status: Status::Closed,
                failure_timestamps: VecDeque::new(),
                last_failure: None,
                probing: false,
                total_puts: 0,
                total_failures: 0,
            }),
        }
    }

    /// 判断当前是否放行一次写入
    ///
    /// 打开状态下返回false；恢复等待结束后转入半开并放行单次
    /// 探测，其余调用方继续等待探测结果。
    pub fn allows_put(&self) -> bool {
        let mut state = self.state.lock();
        match state.status {
            Status::Closed => true,
            Status::Open => {
                if let Some(last_failure) = state.last_failure {
                    if last_failure.elapsed() > self.config.recovery_timeout {
                        state.status = Status::HalfOpen;
                        state.probing = true;
                        self.update_status_metric(Status::HalfOpen);
                        return true;
                    }
                }
                counter!("catalog_store_rejected_total", "backend" => self.backend.clone())
                    .increment(1);
                false
            }
            Status::HalfOpen => {
                if state.probing {
                    false
                } else {
                    state.probing = true;
                    true
                }
            }
        }
    }

    /// 判断保护是否打开（引擎据此跳过整轮派发）
    pub fn is_open(&self) -> bool {
        let state = self.state.lock();
        state.status == Status::Open
            && state
                .last_failure
                .map(|t| t.elapsed() <= self.config.recovery_timeout)
                .unwrap_or(true)
    }

    /// 记录一次写入成功
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.total_puts += 1;
        counter!("catalog_store_puts_total", "backend" => self.backend.clone()).increment(1);

        if state.status != Status::Closed {
            state.status = Status::Closed;
            state.probing = false;
            state.failure_timestamps.clear();
            self.update_status_metric(Status::Closed);
        }
    }

    /// 记录一次写入失败
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.total_puts += 1;
        state.total_failures += 1;
        state.last_failure = Some(now);
        state.failure_timestamps.push_back(now);

        // 移除超出时间窗口的失败记录
        while let Some(front) = state.failure_timestamps.front() {
            if now.duration_since(*front) > self.config.failure_window {
                state.failure_timestamps.pop_front();
            } else {
                break;
            }
        }

        counter!("catalog_store_put_failures_total", "backend" => self.backend.clone())
            .increment(1);

        match state.status {
            Status::Closed => {
                if state.failure_timestamps.len() >= self.config.failure_threshold as usize {
                    state.status = Status::Open;
                    self.update_status_metric(Status::Open);
                }
            }
            Status::HalfOpen => {
                state.status = Status::Open;
                state.probing = false;
                self.update_status_metric(Status::Open);
            }
            Status::Open => {}
        }
    }

    /// 获取保护统计信息
    pub fn stats(&self) -> GuardStats {
        let state = self.state.lock();
        GuardStats {
            is_open: state.status == Status::Open,
            failure_count: state.failure_timestamps.len() as u32,
            total_puts: state.total_puts,
            total_failures: state.total_failures,
        }
    }

    fn update_status_metric(&self, status: Status) {
        let val = match status {
            Status::Closed => 0.0,
            Status::Open => 1.0,
            Status::HalfOpen => 0.5,
        };
        gauge!("catalog_store_guard_status", "backend" => self.backend.clone()).set(val);
    }
}
