//! # spark-virtual-time
//!
//! ## 定位与职责（Why）
//! - 为依赖定时器的异步逻辑提供确定性的虚拟时钟：测试代码显式推进时间，计时器、立即任务与微任务
//!   按与真实事件循环一致的相对顺序执行，耗时为零；
//! - 同刻到期的计时器可按策略重新排列（含带种子的随机策略），用于暴露隐藏的顺序依赖。
//!
//! ## 架构嵌入（Where）
//! - `duration`/`uid`/`sequence`/`timer` 定义基础值类型；
//! - `repository` 维护按到期时刻排序的挂起计时器，`policy` 决定同刻分组的触发顺序；
//! - `engine` 持有虚拟时间并驱动推进与排空，`source` 把引擎暴露为可注入的计时器源；
//! - `config` 与 `controller` 负责会话选项校验与异步门面，`sleep` 提供跟随虚拟时间的 Future。
//!
//! ## 使用约束（Trade-offs）
//! - 推进操作在同一引擎上互斥，回调中重入推进会得到 [`VirtualTimeError::ConcurrentAdvance`]；
//! - 会话之外引擎仍可调度，但 `now`/`uptime` 回落到真实时钟。

/// 会话选项与校验。
pub mod config;

/// 异步门面：会话生命周期与推进操作的 Future 形式。
pub mod controller;

/// 有符号纳秒精度时长。
pub mod duration;

/// 虚拟时钟引擎本体。
///
/// - **意图说明 (Why)**：集中承载虚拟时间、计时器仓库、任务队列与推进守卫；
/// - **契约定位 (What)**：所有调度、取消与推进操作的唯一入口；
/// - **风险提示 (Trade-offs)**：回调在锁外执行，回调中的调度会在下一次排空时生效。
pub mod engine;

/// 错误类型集中声明处，使用 `thiserror` 派生。
pub mod error;

/// 同刻计时器的触发顺序策略。
pub mod policy;

/// 按到期时刻排序的挂起计时器仓库。
pub mod repository;

pub mod sequence;

/// 虚拟时间驱动的睡眠 Future。
pub mod sleep;

/// 可注入的计时器源契约。
pub mod source;

pub mod timer;

pub mod uid;

mod queue;

pub use config::{ResolvedOptions, SessionOptions};
pub use controller::ClockController;
pub use duration::Duration;
pub use engine::{ClockEngine, MIN_REPEAT_PERIOD};
pub use error::{Result, VirtualTimeError};
pub use policy::TimerExpirationPolicy;
pub use queue::Microtask;
pub use repository::{RepositoryConfig, TiedTimer, TimerRepository};
pub use sequence::SequenceGenerator;
pub use sleep::Sleep;
pub use source::TimerSource;
pub use timer::{Timer, TimerArg, TimerCallback, TimerKind, arg};
pub use uid::{TimerId, UidManager, UidRejection};
