// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// 退避策略配置
///
/// 决定目标的下次可调度时间。连续失败未达到阈值时维持目标自身
/// 的抓取周期；达到阈值后按指数拉开间隔并封顶，成功一次即恢复
/// 正常周期（连续失败计数由记账清零）。纯计算，无时钟与随机数
/// 之外的任何依赖。
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// 触发退避的连续失败阈值
    pub failure_threshold: u32,
    /// 退避乘数
    pub multiplier: f64,
    /// 退避后的最大间隔
    pub max_interval: Duration,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
    /// 是否启用抖动
    pub enable_jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            multiplier: 2.0,
            max_interval: Duration::from_secs(3600),
            jitter_factor: 0.1,
            enable_jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// 计算一次尝试后的实际间隔
    ///
    /// # 参数
    ///
    /// * `consecutive_failures` - 本次尝试记账后的连续失败次数
    /// * `base_interval` - 目标自身的抓取周期
    ///
    /// # 返回值
    ///
    /// 距离下次可调度的间隔。未触发退避时等于抓取周期；触发后
    /// 严格大于抓取周期且不超过封顶值。
    pub fn effective_interval(&self, consecutive_failures: u32, base_interval: Duration) -> Duration {
        if consecutive_failures < self.failure_threshold {
            return base_interval;
        }

        // 从阈值起步，每多一次失败多乘一次
        let exponent = (consecutive_failures - self.failure_threshold + 1) as i32;
        let backed_off = base_interval.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = backed_off.min(self.max_interval.as_secs_f64());

        let final_interval = if self.enable_jitter {
            let jitter_range = capped * self.jitter_factor;
            let jitter = rand::random_range(-jitter_range..jitter_range);
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        // 抖动不得把退避间隔压回到基准周期以内
        Duration::from_secs_f64(final_interval.max(base_interval.as_secs_f64()))
    }

    /// 计算目标的下次可调度时间
    ///
    /// # 参数
    ///
    /// * `consecutive_failures` - 记账后的连续失败次数
    /// * `base_interval` - 目标自身的抓取周期
    /// * `now` - 本次尝试的结束时间
    pub fn next_eligible_at(
        &self,
        consecutive_failures: u32,
        base_interval: Duration,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let interval = self.effective_interval(consecutive_failures, base_interval);
        now + chrono::Duration::milliseconds(interval.as_millis() as i64)
    }

    /// 判断给定失败次数是否已触发退避
    pub fn is_backed_off(&self, consecutive_failures: u32) -> bool {
        consecutive_failures >= self.failure_threshold
    }
}
