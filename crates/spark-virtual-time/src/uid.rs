//! 计时器标识的签发与校验。
//!
//! # 设计背景（Why）
//! - 宿主侧只持有不透明句柄，取消操作需要区分“从未签发”“已释放”“格式非法”三类失败，
//!   以便仓库决定是报错还是静默忽略；
//! - 会话结束时整体重置命名空间，新会话从干净状态开始。

use core::fmt;
use std::collections::HashSet;

/// 不透明的计时器标识。
///
/// - 原始值 `0` 从不签发，校验时视为格式非法；
/// - 通过 [`TimerId::from_raw`] 可以把宿主跨边界传递的整数重新包装为句柄。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn into_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// 标识校验失败的原因。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UidRejection {
    /// 当前会话从未签发过该标识。
    NeverIssued,
    /// 标识曾被签发，但对应计时器已触发或已取消。
    AlreadyReleased,
    /// 标识取值不在合法范围内。
    Malformed,
}

impl fmt::Display for UidRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            UidRejection::NeverIssued => "uid was never issued in this session",
            UidRejection::AlreadyReleased => "uid was already released",
            UidRejection::Malformed => "uid is malformed",
        };
        f.write_str(reason)
    }
}

/// 签发并跟踪存活标识的管理器。
///
/// # 教案式说明
/// - **契约 (What)**：`issue` 返回的标识在会话内单调递增、永不复用；`validate` 仅对存活标识返回 `Ok`；
/// - **执行 (How)**：`next` 记录下一个待签发值，`live` 保存尚未释放的标识集合；
/// - **注意 (Trade-offs)**：Interval 计时器重新入队时沿用原标识，不经过 `issue`。
#[derive(Debug)]
pub struct UidManager {
    next: u64,
    live: HashSet<u64>,
}

impl Default for UidManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UidManager {
    pub fn new() -> Self {
        Self {
            next: 1,
            live: HashSet::new(),
        }
    }

    pub fn issue(&mut self) -> TimerId {
        let raw = self.next;
        self.next = self.next.saturating_add(1);
        self.live.insert(raw);
        TimerId(raw)
    }

    pub fn validate(&self, uid: TimerId) -> Result<(), UidRejection> {
        if uid.0 == 0 {
            Err(UidRejection::Malformed)
        } else if uid.0 >= self.next {
            Err(UidRejection::NeverIssued)
        } else if !self.live.contains(&uid.0) {
            Err(UidRejection::AlreadyReleased)
        } else {
            Ok(())
        }
    }

    /// 标记标识失效；重复释放无副作用。
    pub fn release(&mut self, uid: TimerId) {
        self.live.remove(&uid.0);
    }

    pub fn reset(&mut self) {
        self.next = 1;
        self.live.clear();
    }
}
