//! 计时器源抽象：宿主调度原语与时钟查询的统一注入点。
//!
//! # 设计背景（Why）
//! - 业务组件通过 `Arc<dyn TimerSource>` 获取定时与时钟能力，测试时注入 [`ClockEngine`]，
//!   由引擎代替真实的操作系统定时器；
//! - 把原语替换机制本身留在 crate 之外，这里只约定接口。
//!
//! # 接口约束（What）
//! - 接口必须保持对象安全：回调与微任务均以装箱形式传入；
//! - `cancel` 的失败语义与 [`ClockEngine::cancel`] 一致。

use std::time::SystemTime;

use crate::duration::Duration;
use crate::engine::ClockEngine;
use crate::error::Result;
use crate::queue::Microtask;
use crate::timer::{TimerArg, TimerCallback};
use crate::uid::TimerId;

/// 可替换的计时器源。
pub trait TimerSource: Send + Sync {
    /// 登记单次计时器，`delay` 后触发。
    fn schedule_once(&self, callback: TimerCallback, args: Vec<TimerArg>, delay: Duration)
    -> TimerId;

    /// 登记周期计时器，每 `period` 触发一次。
    fn schedule_repeating(
        &self,
        callback: TimerCallback,
        args: Vec<TimerArg>,
        period: Duration,
    ) -> TimerId;

    /// 登记立即任务，在下一次排空时执行。
    fn schedule_immediate(&self, callback: TimerCallback, args: Vec<TimerArg>) -> TimerId;

    /// 登记微任务，先于任何立即任务执行。
    fn schedule_microtask(&self, task: Microtask);

    /// 按句柄取消。
    ///
    /// # Errors
    /// 句柄非法且配置要求报错时返回 [`crate::VirtualTimeError::InvalidUid`]。
    fn cancel(&self, handle: TimerId) -> Result<()>;

    /// 当前墙上时间。
    fn now(&self) -> SystemTime;

    /// 进程启动以来的时长。
    fn uptime(&self) -> std::time::Duration;
}

impl TimerSource for ClockEngine {
    fn schedule_once(
        &self,
        callback: TimerCallback,
        args: Vec<TimerArg>,
        delay: Duration,
    ) -> TimerId {
        ClockEngine::schedule_once(self, callback, args, delay)
    }

    fn schedule_repeating(
        &self,
        callback: TimerCallback,
        args: Vec<TimerArg>,
        period: Duration,
    ) -> TimerId {
        ClockEngine::schedule_repeating(self, callback, args, period)
    }

    fn schedule_immediate(&self, callback: TimerCallback, args: Vec<TimerArg>) -> TimerId {
        ClockEngine::schedule_immediate(self, callback, args)
    }

    fn schedule_microtask(&self, task: Microtask) {
        ClockEngine::schedule_microtask(self, task);
    }

    fn cancel(&self, handle: TimerId) -> Result<()> {
        ClockEngine::cancel(self, handle)
    }

    fn now(&self) -> SystemTime {
        ClockEngine::now(self)
    }

    fn uptime(&self) -> std::time::Duration {
        ClockEngine::uptime(self)
    }
}
