//! 同刻计时器的到期顺序策略。
//!
//! # 设计背景（Why）
//! - 真实事件循环对同一时刻到期的计时器并不总是保证登记顺序，测试需要能够主动打乱同刻顺序，
//!   暴露对隐式顺序的依赖；
//! - 策略只作用于当前最小到期时刻的同刻分组，绝不跨时刻重排。
//!
//! # 使用指引（How）
//! - 引擎对分组快照调用 [`TimerExpirationPolicy::arrange`]，并在整组触发完毕前不再咨询策略；
//! - 随机策略使用可播种的 `StdRng`，相同种子得到相同顺序，失败用例可以复现。

use core::fmt;
use core::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::VirtualTimeError;
use crate::repository::TiedTimer;
use crate::timer::TimerKind;

/// 到期顺序策略。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TimerExpirationPolicy {
    /// 按登记顺序（序号升序）。
    #[default]
    Default,
    /// 所有 Timeout 先于所有 Interval，两组内部均随机。
    TimeoutsFirstRandom,
    /// 所有 Interval 先于所有 Timeout，两组内部均随机。
    IntervalsFirstRandom,
    /// 忽略类型，整组随机。
    Random,
}

impl TimerExpirationPolicy {
    pub const ALL: [TimerExpirationPolicy; 4] = [
        TimerExpirationPolicy::Default,
        TimerExpirationPolicy::TimeoutsFirstRandom,
        TimerExpirationPolicy::IntervalsFirstRandom,
        TimerExpirationPolicy::Random,
    ];

    /// 配置中使用的规范名称。
    pub const fn as_str(self) -> &'static str {
        match self {
            TimerExpirationPolicy::Default => "Default",
            TimerExpirationPolicy::TimeoutsFirstRandom => "Timeouts-First-Random",
            TimerExpirationPolicy::IntervalsFirstRandom => "Intervals-First-Random",
            TimerExpirationPolicy::Random => "Random",
        }
    }

    pub const fn is_random(self) -> bool {
        !matches!(self, TimerExpirationPolicy::Default)
    }

    /// 对同刻分组快照排序，返回后的顺序即为触发顺序。
    ///
    /// # 契约说明（What）
    /// - `Default`：序号升序；
    /// - `TimeoutsFirstRandom`/`IntervalsFirstRandom`：按类型分成前后两段，各段内部洗牌；
    /// - `Random`：整组洗牌；
    /// - 不属于 Timeout/Interval 的条目（理论上不会出现在仓库中）归入后段。
    pub fn arrange(self, group: &mut Vec<TiedTimer>, rng: &mut StdRng) {
        match self {
            TimerExpirationPolicy::Default => {
                group.sort_by_key(|tied| tied.sequence_number);
            }
            TimerExpirationPolicy::TimeoutsFirstRandom => {
                partition_then_shuffle(group, TimerKind::Timeout, rng);
            }
            TimerExpirationPolicy::IntervalsFirstRandom => {
                partition_then_shuffle(group, TimerKind::Interval, rng);
            }
            TimerExpirationPolicy::Random => group.shuffle(rng),
        }
    }
}

fn partition_then_shuffle(group: &mut Vec<TiedTimer>, leading: TimerKind, rng: &mut StdRng) {
    let (mut front, mut back): (Vec<_>, Vec<_>) =
        group.drain(..).partition(|tied| tied.kind == leading);
    front.shuffle(rng);
    back.shuffle(rng);
    group.append(&mut front);
    group.append(&mut back);
}

impl FromStr for TimerExpirationPolicy {
    type Err = VirtualTimeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|policy| policy.as_str() == value)
            .ok_or_else(|| VirtualTimeError::UnknownPolicy {
                value: value.to_owned(),
            })
    }
}

impl fmt::Display for TimerExpirationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
