//! 虚拟时钟的异步门面。
//!
//! # 模块定位（Why）
//! - 测试代码通常以 `async` 流程串联多个步骤，门面把引擎操作包装为 Future，便于与其他异步断言组合；
//! - 会话开始前统一校验配置，非法策略名在任何计时器工作发生前即被拒绝。
//!
//! # 使用指引（How）
//! ```
//! use futures::executor::block_on;
//! use spark_virtual_time::{ClockController, Duration, SessionOptions};
//!
//! let controller = ClockController::new();
//! block_on(async {
//!     controller.begin_session(SessionOptions::new()).await?;
//!     controller.engine().set_timeout(Duration::milliseconds(50), || {});
//!     controller.advance(Duration::milliseconds(50)).await?;
//!     assert_eq!(controller.engine().pending_timers(), 0);
//!     controller.end_session().await.map(|_| ())
//! })
//! .expect("virtual time session");
//! ```

use crate::config::SessionOptions;
use crate::duration::Duration;
use crate::engine::ClockEngine;
use crate::error::Result;
use crate::timer::Timer;

/// 组合会话生命周期与时间推进操作的异步门面。
#[derive(Clone, Debug, Default)]
pub struct ClockController {
    engine: ClockEngine,
}

impl ClockController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(engine: ClockEngine) -> Self {
        Self { engine }
    }

    /// 底层引擎句柄，用于登记计时器与查询时间。
    pub fn engine(&self) -> &ClockEngine {
        &self.engine
    }

    /// 开启拦截会话。
    ///
    /// # Errors
    /// - 策略名无法识别：[`crate::VirtualTimeError::UnknownPolicy`]，引擎状态不受影响；
    /// - 已有活动会话：[`crate::VirtualTimeError::AlreadyIntercepting`]。
    pub async fn begin_session(&self, options: SessionOptions) -> Result<()> {
        let resolved = options.resolve()?;
        self.engine.begin_session(&resolved)
    }

    /// 结束会话并返回被丢弃的挂起计时器。
    ///
    /// # Errors
    /// 没有活动会话时返回 [`crate::VirtualTimeError::NotIntercepting`]。
    pub async fn end_session(&self) -> Result<Vec<Timer>> {
        self.engine.end_session()
    }

    /// # Errors
    /// 见 [`ClockEngine::advance`]。
    pub async fn advance(&self, duration: Duration) -> Result<()> {
        self.engine.advance(duration)
    }

    /// # Errors
    /// 见 [`ClockEngine::expire_all_timeouts`]。
    pub async fn expire_all_timeouts(&self) -> Result<()> {
        self.engine.expire_all_timeouts()
    }

    /// # Errors
    /// 见 [`ClockEngine::forward_to_next_timer`]。
    pub async fn forward_to_next_timer(&self) -> Result<()> {
        self.engine.forward_to_next_timer()
    }
}
