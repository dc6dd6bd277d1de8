//! 纳秒精度的虚拟时间跨度。
//!
//! # 模块定位（Why）
//! - 调度引擎的所有比较与推进都基于整数纳秒，避免浮点累积误差导致同一时刻的计时器被错误拆分；
//! - 与 `std::time::Duration` 不同，本类型允许出现负值：负值仅作为“非法推进输入”被识别与拒绝。
//!
//! # 契约说明（What）
//! - 加减法采用饱和运算，任何输入都不会触发 panic；
//! - [`Duration::is_longer_than`] 为严格大于比较，用于决定插入位置，相等时刻不会因此被重排。

use core::fmt;
use core::ops::{Add, Sub};

const NANOS_PER_MICRO: i64 = 1_000;
const NANOS_PER_MILLI: i64 = 1_000_000;
const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: i64 = 24 * NANOS_PER_HOUR;

/// 不可变的虚拟时间跨度，内部以 `i64` 纳秒表示。
///
/// # 教案式说明
/// - **意图 (Why)**：为计时器的到期时刻、周期与推进量提供统一度量，保证比较与算术完全精确；
/// - **契约 (What)**：构造函数对溢出做饱和处理；`Ord` 按纳秒值全序比较；
/// - **风险 (Trade-offs)**：`i64` 纳秒约可表示 292 年，对测试场景绰绰有余，超出部分被饱和截断。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    nanos: i64,
}

impl Duration {
    /// 零长度跨度。
    pub const ZERO: Duration = Duration { nanos: 0 };

    pub const fn nanoseconds(nanos: i64) -> Self {
        Self { nanos }
    }

    pub const fn microseconds(micros: i64) -> Self {
        Self::scaled(micros, NANOS_PER_MICRO)
    }

    pub const fn milliseconds(millis: i64) -> Self {
        Self::scaled(millis, NANOS_PER_MILLI)
    }

    pub const fn seconds(secs: i64) -> Self {
        Self::scaled(secs, NANOS_PER_SECOND)
    }

    pub const fn minutes(minutes: i64) -> Self {
        Self::scaled(minutes, NANOS_PER_MINUTE)
    }

    pub const fn hours(hours: i64) -> Self {
        Self::scaled(hours, NANOS_PER_HOUR)
    }

    pub const fn days(days: i64) -> Self {
        Self::scaled(days, NANOS_PER_DAY)
    }

    const fn scaled(value: i64, unit: i64) -> Self {
        Self {
            nanos: value.saturating_mul(unit),
        }
    }

    /// 返回纳秒数。
    pub const fn as_nanos(self) -> i64 {
        self.nanos
    }

    /// 以 `f64` 秒表示，供 uptime 查询使用。
    pub fn as_secs_f64(self) -> f64 {
        self.nanos as f64 / NANOS_PER_SECOND as f64
    }

    pub const fn is_negative(self) -> bool {
        self.nanos < 0
    }

    pub const fn is_zero(self) -> bool {
        self.nanos == 0
    }

    /// 严格大于比较：仅当 `self` 比 `other` 更长时返回 `true`。
    pub const fn is_longer_than(self, other: Duration) -> bool {
        self.nanos > other.nanos
    }

    /// 转换为标准库跨度；负值无法表示，返回 `None`。
    pub fn to_std(self) -> Option<std::time::Duration> {
        u64::try_from(self.nanos)
            .ok()
            .map(std::time::Duration::from_nanos)
    }

    /// 截断到非负区间，负值视为零。
    pub const fn clamp_non_negative(self) -> Self {
        if self.nanos < 0 { Self::ZERO } else { self }
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration {
            nanos: self.nanos.saturating_add(rhs.nanos),
        }
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Duration {
        Duration {
            nanos: self.nanos.saturating_sub(rhs.nanos),
        }
    }
}

impl From<std::time::Duration> for Duration {
    fn from(value: std::time::Duration) -> Self {
        Self {
            nanos: i64::try_from(value.as_nanos()).unwrap_or(i64::MAX),
        }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos % NANOS_PER_MILLI == 0 {
            write!(f, "{}ms", self.nanos / NANOS_PER_MILLI)
        } else {
            write!(f, "{}ns", self.nanos)
        }
    }
}
