//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义虚拟时钟引擎对外暴露的失败语义，所有错误均为调用点同步返回；
//! - 任何错误都不会破坏仓库的有序不变式，调用方修正输入后可直接再次调用。
//!
//! ## 设计要求（What）
//! - 使用 `thiserror::Error` 派生，兼容 `std::error::Error`；
//! - 不做自动重试，是否重试由调用方决定。

use thiserror::Error;

use crate::uid::{TimerId, UidRejection};

/// 虚拟时钟错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：区分配置期错误（策略名非法）、推进期错误（负值/重入）与取消期错误（标识非法）；
/// - **契约 (What)**：所有变体均为 `Send + Sync + 'static`，可以安全地跨 Future 传播；
/// - **设计权衡 (Trade-offs)**：`UnknownPolicy` 保留原始字符串，便于定位配置来源。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VirtualTimeError {
    /// 推进量为负。
    ///
    /// - **契约 (What)**：总是同步失败，虚拟时间保持不变，不会部分应用。
    #[error("cannot advance virtual time by a negative duration ({nanos}ns)")]
    InvalidDuration { nanos: i64 },

    /// 同一引擎上已有推进操作在执行，典型场景是回调内同步地再次推进时间。
    ///
    /// - **契约 (What)**：守卫在所有退出路径上释放，外层推进不受影响。
    #[error("virtual time is already being advanced on this engine")]
    ConcurrentAdvance,

    /// 取消时传入的标识未通过校验，仅在开启 `throwOnInvalidClearTimer` 时返回。
    #[error("invalid uid {uid} during clearing timer: {reason}")]
    InvalidUid { uid: TimerId, reason: UidRejection },

    /// 会话配置中出现无法识别的到期策略名。
    #[error("unknown timer expiration policy `{value}`")]
    UnknownPolicy { value: String },

    /// 会话已处于拦截状态，不能重复开启。
    #[error("timers are already intercepted by an active session")]
    AlreadyIntercepting,

    /// 当前没有活动会话。
    #[error("timers are not intercepted by any session")]
    NotIntercepting,
}

/// 虚拟时钟操作的统一返回类型。
pub type Result<T, E = VirtualTimeError> = core::result::Result<T, E>;
