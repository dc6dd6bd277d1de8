//! 按到期时刻排序的计时器仓库。
//!
//! # 模块定位（Why）
//! - 所有挂起计时器的唯一所有者：插入、取消、触发摘除与会话结束时的整体释放都必须经过本模块；
//! - Interval 的重新调度走与新登记相同的 [`TimerRepository::insert`] 路径，排序不变式只在一处维护。
//!
//! # 不变式（What）
//! - 内容始终按 `due_time` 升序；同一时刻内按 `sequence_number` 升序（先登记者在前）；
//! - 一个标识在任意时刻至多对应一个存活计时器。

use tracing::debug;

use crate::duration::Duration;
use crate::error::{Result, VirtualTimeError};
use crate::sequence::SequenceGenerator;
use crate::timer::{ExpiredTimer, Timer, TimerKind};
use crate::uid::{TimerId, UidManager};

/// 仓库配置。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// 取消非法标识时是否返回 [`VirtualTimeError::InvalidUid`]；关闭时静默忽略。
    pub throw_on_invalid_clear_timer: bool,
}

/// 同刻分组中单个计时器的稳定快照。
///
/// 触发路径先对快照排序、再逐个按标识摘除，回调中途的取消不会让迭代失效。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TiedTimer {
    pub uid: TimerId,
    pub kind: TimerKind,
    pub sequence_number: u64,
}

/// 有序计时器仓库。
///
/// # 教案式说明
/// - **意图 (Why)**：以单一有序 `Vec` 保存挂起计时器，插入用二分定位，保证同刻 FIFO；
/// - **契约 (What)**：
///   - `insert`：未设置标识时签发新标识，并总是分配新序号；
///   - `cancel`：按配置决定非法标识是报错还是静默忽略；
///   - `release_all`：原子清空仓库并重置标识与序号命名空间；
/// - **权衡 (Trade-offs)**：测试场景计时器数量有限，线性查找标识足够简单且易于验证。
#[derive(Debug, Default)]
pub struct TimerRepository {
    config: RepositoryConfig,
    sequence: SequenceGenerator,
    uids: UidManager,
    timers: Vec<Timer>,
}

impl TimerRepository {
    pub fn new(config: RepositoryConfig) -> Self {
        Self {
            config,
            sequence: SequenceGenerator::new(),
            uids: UidManager::new(),
            timers: Vec::new(),
        }
    }

    pub fn config(&self) -> RepositoryConfig {
        self.config
    }

    pub fn set_config(&mut self, config: RepositoryConfig) {
        self.config = config;
    }

    /// 插入计时器并返回其标识。
    ///
    /// 定位到第一个到期时刻严格晚于新计时器的条目并插在其前，相同时刻的新条目因此排在已有条目之后。
    pub fn insert(&mut self, mut timer: Timer) -> TimerId {
        let uid = match timer.uid {
            Some(uid) => uid,
            None => self.uids.issue(),
        };
        timer.uid = Some(uid);
        timer.sequence_number = self.sequence.generate();

        let due_time = timer.due_time;
        let index = self
            .timers
            .partition_point(|existing| !existing.due_time.is_longer_than(due_time));
        self.timers.insert(index, timer);
        uid
    }

    /// 按标识取消计时器。
    ///
    /// # Errors
    /// 标识未通过校验且 `throw_on_invalid_clear_timer` 开启时返回 [`VirtualTimeError::InvalidUid`]。
    pub fn cancel(&mut self, uid: TimerId) -> Result<()> {
        if let Err(reason) = self.uids.validate(uid) {
            if self.config.throw_on_invalid_clear_timer {
                return Err(VirtualTimeError::InvalidUid { uid, reason });
            }
            debug!(%uid, %reason, "ignoring cancellation of an invalid timer uid");
            return Ok(());
        }

        if let Some(index) = self.position(uid) {
            self.timers.remove(index);
        }
        self.uids.release(uid);
        Ok(())
    }

    /// 清空仓库，返回被丢弃的计时器供调用方清理其引用的资源。
    pub fn release_all(&mut self) -> Vec<Timer> {
        let released = std::mem::take(&mut self.timers);
        self.uids.reset();
        self.sequence.reset();
        released
    }

    /// 把全部到期时刻提前 `elapsed`，用于时间原点重置时保留每个计时器的剩余延迟。
    ///
    /// 统一平移不改变相对顺序；结果可以为负，表示计时器已逾期。
    pub fn rebase(&mut self, elapsed: Duration) {
        for timer in &mut self.timers {
            timer.due_time = timer.due_time - elapsed;
        }
    }

    pub fn peek_earliest(&self) -> Option<&Timer> {
        self.timers.first()
    }

    pub fn peek_latest(&self) -> Option<&Timer> {
        self.timers.last()
    }

    /// 最早到期的 Timeout 类计时器。
    pub fn earliest_timeout(&self) -> Option<&Timer> {
        self.timers
            .iter()
            .find(|timer| timer.kind() == TimerKind::Timeout)
    }

    /// 当前最小到期时刻上的同刻分组快照（按序号升序）。
    pub fn tied_group(&self) -> Option<(Duration, Vec<TiedTimer>)> {
        self.earliest_group_where(|_| true)
    }

    /// 在满足 `eligible` 的计时器中取最小到期时刻的同刻分组。
    ///
    /// 不满足条件的计时器保持原位，既不参与本组，也不影响分组边界的判定。
    pub fn earliest_group_where<P>(&self, eligible: P) -> Option<(Duration, Vec<TiedTimer>)>
    where
        P: FnMut(&&Timer) -> bool,
    {
        let mut candidates = self.timers.iter().filter(eligible);
        let first = candidates.next()?;
        let due_time = first.due_time;
        let mut group = vec![TiedTimer::of(first)];
        group.extend(
            candidates
                .take_while(|timer| timer.due_time == due_time)
                .map(TiedTimer::of),
        );
        Some((due_time, group))
    }

    /// 摘除即将触发的计时器。
    ///
    /// - Interval：立即以 `due_time + period` 和新序号重新入队，标识保持不变；
    /// - Timeout：释放标识，之后的取消会被判定为“已释放”；
    /// - Interval 的下一次到期时刻超出可表示范围时按 Timeout 处理，本次触发后即失效；
    /// - 标识已不在仓库中（例如被同组前序回调取消）时返回 `None`。
    pub(crate) fn expire(&mut self, uid: TimerId) -> Option<ExpiredTimer> {
        let index = self.position(uid)?;
        let timer = self.timers.remove(index);
        match timer.next_occurrence() {
            Some(next) => {
                self.insert(next);
            }
            None => {
                if timer.kind() == TimerKind::Interval {
                    debug!(
                        %uid,
                        due = %timer.due_time,
                        "interval cannot repeat past the end of virtual time"
                    );
                }
                self.uids.release(uid);
            }
        }
        Some(timer.into_expired())
    }

    /// 为不进入有序队列的立即任务签发标识。
    pub fn allocate_uid(&mut self) -> TimerId {
        self.uids.issue()
    }

    pub fn release_uid(&mut self, uid: TimerId) {
        self.uids.release(uid);
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Timer> {
        self.timers.iter()
    }

    fn position(&self, uid: TimerId) -> Option<usize> {
        self.timers.iter().position(|timer| timer.uid == Some(uid))
    }
}

impl TiedTimer {
    fn of(timer: &Timer) -> Self {
        Self {
            // 仓库内的计时器在插入时必然已分配标识。
            uid: timer.uid.unwrap_or(TimerId::from_raw(0)),
            kind: timer.kind(),
            sequence_number: timer.sequence_number,
        }
    }
}
