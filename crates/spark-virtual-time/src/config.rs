//! 会话配置。
//!
//! # 模块定位（Why）
//! - 宿主以键值形式传入拦截选项（`timerExpirationPolicy`、`throwOnInvalidClearTimer` 等），
//!   本模块负责承载这些原始值并在会话开始前一次性校验；
//! - 校验失败（例如策略名拼写错误）必须发生在任何计时器工作之前。
//!
//! # 使用指引（How）
//! - 代码内可使用构建器方法组装选项；
//! - 从 JSON/TOML 等配置源读取时，字段名使用 camelCase，与宿主侧选项名保持一致；
//! - [`SessionOptions::resolve`] 将原始选项转换为引擎直接消费的 [`ResolvedOptions`]。

use std::time::{Duration as StdDuration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::policy::TimerExpirationPolicy;
use crate::repository::RepositoryConfig;

/// 拦截会话的原始选项。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `timer_expiration_policy`：策略名，缺省为 `Default`；
///   - `throw_on_invalid_clear_timer`：取消非法标识时是否报错；
///   - `random_seed`：随机策略的种子，缺省时随机抽取并记录到日志；
///   - `epoch_offset_millis`：会话内 `now()` 的起点相对 Unix 纪元的毫秒偏移，缺省为 0；
/// - **风险 (Trade-offs)**：策略以字符串保存，以便在 `resolve` 阶段给出包含原值的错误信息。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionOptions {
    pub timer_expiration_policy: Option<String>,
    pub throw_on_invalid_clear_timer: bool,
    pub random_seed: Option<u64>,
    pub epoch_offset_millis: u64,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(self, policy: TimerExpirationPolicy) -> Self {
        self.with_policy_name(policy.as_str())
    }

    pub fn with_policy_name(mut self, name: impl Into<String>) -> Self {
        self.timer_expiration_policy = Some(name.into());
        self
    }

    pub fn with_throw_on_invalid_clear_timer(mut self, enabled: bool) -> Self {
        self.throw_on_invalid_clear_timer = enabled;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn with_epoch_offset_millis(mut self, millis: u64) -> Self {
        self.epoch_offset_millis = millis;
        self
    }

    /// 校验并解析选项。
    ///
    /// # Errors
    /// 策略名无法识别时返回 [`crate::VirtualTimeError::UnknownPolicy`]。
    pub fn resolve(&self) -> Result<ResolvedOptions> {
        let policy = match self.timer_expiration_policy.as_deref() {
            Some(name) => name.parse()?,
            None => TimerExpirationPolicy::Default,
        };
        let epoch = UNIX_EPOCH
            .checked_add(StdDuration::from_millis(self.epoch_offset_millis))
            .unwrap_or(UNIX_EPOCH);

        Ok(ResolvedOptions {
            policy,
            repository: RepositoryConfig {
                throw_on_invalid_clear_timer: self.throw_on_invalid_clear_timer,
            },
            random_seed: self.random_seed,
            epoch,
        })
    }
}

/// 校验通过、可直接交给引擎的会话配置。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub policy: TimerExpirationPolicy,
    pub repository: RepositoryConfig,
    pub random_seed: Option<u64>,
    pub epoch: SystemTime,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        Self {
            policy: TimerExpirationPolicy::Default,
            repository: RepositoryConfig::default(),
            random_seed: None,
            epoch: UNIX_EPOCH,
        }
    }
}
