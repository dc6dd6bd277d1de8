//! 计时器数据模型。
//!
//! # 结构概览（What）
//! - [`Timer`]：一次登记的延迟/周期/立即工作，包含到期时刻、序号、类型与回调；
//! - [`TimerCallback`]：可共享的 `FnMut` 回调，Interval 重新入队后仍指向同一个闭包；
//! - [`TimerArg`]：回调参数，核心层不解释其内容。

use core::any::Any;
use core::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::duration::Duration;
use crate::uid::TimerId;

/// 回调参数，调用方可通过 `downcast_ref` 还原具体类型。
pub type TimerArg = Arc<dyn Any + Send + Sync>;

/// 将任意值包装为 [`TimerArg`]。
pub fn arg<T: Any + Send + Sync>(value: T) -> TimerArg {
    Arc::new(value)
}

/// 计时器类型。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// 单次触发。
    Timeout,
    /// 周期触发，触发后按周期重新入队。
    Interval,
    /// 立即执行，不进入到期时刻队列，而是进入立即任务队列。
    Immediate,
}

type CallbackFn = dyn FnMut(&[TimerArg]) + Send;

/// 共享回调句柄。
///
/// # 教案式说明
/// - **意图 (Why)**：Interval 触发时需先重新入队再执行回调，回调必须能同时被仓库与触发路径引用；
/// - **契约 (What)**：克隆只增加引用计数；`invoke` 期间持有回调自身的锁，但不会持有引擎状态锁；
/// - **风险 (Trade-offs)**：同一回调不可递归调用自身，推进守卫保证了这一点。
#[derive(Clone)]
pub struct TimerCallback {
    inner: Arc<Mutex<Box<CallbackFn>>>,
}

impl TimerCallback {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(&[TimerArg]) + Send + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Box::new(callback))),
        }
    }

    pub fn invoke(&self, args: &[TimerArg]) {
        let mut guard = self.inner.lock();
        let callback = &mut *guard;
        callback(args);
    }
}

impl fmt::Debug for TimerCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerCallback").finish_non_exhaustive()
    }
}

/// 一次已登记的调度工作。
///
/// 计时器一经插入仓库即由仓库独占，外部只能通过标识取消。
#[derive(Debug)]
pub struct Timer {
    pub(crate) uid: Option<TimerId>,
    pub(crate) due_time: Duration,
    pub(crate) sequence_number: u64,
    kind: TimerKind,
    period: Option<Duration>,
    callback: TimerCallback,
    args: Vec<TimerArg>,
}

impl Timer {
    pub fn timeout(due_time: Duration, callback: TimerCallback, args: Vec<TimerArg>) -> Self {
        Self::build(due_time, TimerKind::Timeout, None, callback, args)
    }

    pub fn interval(
        due_time: Duration,
        period: Duration,
        callback: TimerCallback,
        args: Vec<TimerArg>,
    ) -> Self {
        Self::build(due_time, TimerKind::Interval, Some(period), callback, args)
    }

    pub fn immediate(due_time: Duration, callback: TimerCallback, args: Vec<TimerArg>) -> Self {
        Self::build(due_time, TimerKind::Immediate, None, callback, args)
    }

    fn build(
        due_time: Duration,
        kind: TimerKind,
        period: Option<Duration>,
        callback: TimerCallback,
        args: Vec<TimerArg>,
    ) -> Self {
        Self {
            uid: None,
            due_time,
            sequence_number: 0,
            kind,
            period,
            callback,
            args,
        }
    }

    pub fn uid(&self) -> Option<TimerId> {
        self.uid
    }

    pub fn due_time(&self) -> Duration {
        self.due_time
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    pub fn args(&self) -> &[TimerArg] {
        &self.args
    }

    /// 生成下一次周期触发的副本。
    ///
    /// 非 Interval 返回 `None`；下一次到期时刻溢出或未严格晚于本次时同样返回 `None`，
    /// 否则饱和在上限的 Interval 会让推进永远无法结束。
    pub(crate) fn next_occurrence(&self) -> Option<Timer> {
        let period = self.period?;
        let next_due = self
            .due_time
            .as_nanos()
            .checked_add(period.as_nanos())
            .map(Duration::nanoseconds)
            .filter(|next| next.is_longer_than(self.due_time))?;
        Some(Timer {
            uid: self.uid,
            due_time: next_due,
            sequence_number: 0,
            kind: self.kind,
            period: self.period,
            callback: self.callback.clone(),
            args: self.args.clone(),
        })
    }

    pub(crate) fn into_expired(self) -> ExpiredTimer {
        ExpiredTimer {
            kind: self.kind,
            due_time: self.due_time,
            callback: self.callback,
            args: self.args,
        }
    }
}

/// 已从仓库摘除、等待执行的计时器。
#[derive(Debug)]
pub(crate) struct ExpiredTimer {
    pub(crate) kind: TimerKind,
    pub(crate) due_time: Duration,
    callback: TimerCallback,
    args: Vec<TimerArg>,
}

impl ExpiredTimer {
    pub(crate) fn run(self) {
        self.callback.invoke(&self.args);
    }
}
