//! 虚拟时钟引擎：持有虚拟时间与计时器仓库，驱动推进、排空与触发。
//!
//! # 模块定位（Why）
//! - 在零真实耗时的前提下复现真实事件循环的相对顺序：每次触发计时器前后都把立即任务与微任务排空；
//! - 支持分段推进（`advance(a)` 后 `advance(b)` 与一次 `advance(a + b)` 结果一致）；
//! - 以显式守卫拒绝回调中的重入推进，守卫在所有退出路径上释放。
//!
//! # 行为概览（How）
//! - 引擎句柄可廉价克隆（`Arc` + `parking_lot::Mutex`），回调通过捕获克隆来登记、取消或尝试推进；
//! - 执行任何回调之前都会释放状态锁，回调内部的调度/取消因此不会死锁；
//! - 同刻分组先取快照并由策略排好顺序，再逐个按标识摘除触发，回调中途的取消被安全跳过。
//!
//! # 契约说明（What）
//! - 推进族操作（`advance`/`expire_all_timeouts`/`forward_to_next_timer`）同一时刻至多一个在执行；
//! - 虚拟时间只会前进：逾期计时器按当前时间触发，不会把时钟拨回。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, trace};

use crate::config::ResolvedOptions;
use crate::duration::Duration;
use crate::error::{Result, VirtualTimeError};
use crate::policy::TimerExpirationPolicy;
use crate::queue::{Microtask, TaskQueues};
use crate::repository::{RepositoryConfig, TiedTimer, TimerRepository};
use crate::timer::{ExpiredTimer, Timer, TimerArg, TimerCallback, TimerKind};
use crate::uid::TimerId;

/// 周期计时器的最小周期，与宿主计时器分辨率一致；零周期会让推进无法终止。
pub const MIN_REPEAT_PERIOD: Duration = Duration::milliseconds(1);

/// 虚拟时钟引擎句柄。
///
/// # 教案式说明
/// - **意图 (Why)**：为测试提供完全可控的时间源，替代真实的定时器与时钟；
/// - **契约 (What)**：
///   - 克隆得到的句柄共享同一份状态；
///   - 会话外仍可登记与推进，但时间查询回落到真实时钟；
///   - 所有失败均同步返回，不破坏仓库不变式；
/// - **风险 (Trade-offs)**：回调持有引擎克隆会形成引用环，会话结束时 `end_session` 释放全部计时器以打破环。
#[derive(Clone, Debug)]
pub struct ClockEngine {
    inner: Arc<EngineInner>,
}

#[derive(Debug)]
struct EngineInner {
    state: Mutex<EngineState>,
    created: Instant,
}

#[derive(Debug)]
struct EngineState {
    active: bool,
    generation: u64,
    current: Duration,
    advancing: bool,
    policy: TimerExpirationPolicy,
    rng: StdRng,
    epoch: SystemTime,
    repository: TimerRepository,
    queues: TaskQueues,
}

/// 推进守卫：构造时置位 `advancing`，析构时复位。
///
/// 回调 panic 展开时同样经过 `Drop`，引擎因此在任何退出路径后都可继续使用。
struct AdvanceGuard<'a> {
    inner: &'a EngineInner,
}

impl<'a> AdvanceGuard<'a> {
    fn acquire(inner: &'a EngineInner) -> Result<Self> {
        let mut state = inner.state.lock();
        if state.advancing {
            return Err(VirtualTimeError::ConcurrentAdvance);
        }
        state.advancing = true;
        Ok(Self { inner })
    }
}

impl Drop for AdvanceGuard<'_> {
    fn drop(&mut self) {
        self.inner.state.lock().advancing = false;
    }
}

impl Default for ClockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockEngine {
    pub fn new() -> Self {
        let resolved = ResolvedOptions::default();
        Self {
            inner: Arc::new(EngineInner {
                state: Mutex::new(EngineState {
                    active: false,
                    generation: 0,
                    current: Duration::ZERO,
                    advancing: false,
                    policy: resolved.policy,
                    rng: StdRng::seed_from_u64(0),
                    epoch: resolved.epoch,
                    repository: TimerRepository::new(resolved.repository),
                    queues: TaskQueues::default(),
                }),
                created: Instant::now(),
            }),
        }
    }

    /// 开启拦截会话。
    ///
    /// # 契约说明（What）
    /// - 虚拟时间原点重置为零；
    /// - 会话开始前登记的计时器与排队任务会被保留，计时器的到期时刻整体平移，
    ///   剩余延迟与会话开始前一致（例如会话外已推进 60ms 的 100ms 计时器，会话内再推进 40ms 即触发）；
    /// - 随机策略的种子以 `debug` 级别记录，便于复现。
    ///
    /// # Errors
    /// - 已有活动会话时返回 [`VirtualTimeError::AlreadyIntercepting`]；
    /// - 在推进回调中调用时返回 [`VirtualTimeError::ConcurrentAdvance`]。
    pub fn begin_session(&self, options: &ResolvedOptions) -> Result<()> {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        if state.active {
            return Err(VirtualTimeError::AlreadyIntercepting);
        }
        if state.advancing {
            return Err(VirtualTimeError::ConcurrentAdvance);
        }
        let seed = options.random_seed.unwrap_or_else(rand::random);
        let carried = state.repository.len();
        state.repository.rebase(state.current);
        state.active = true;
        state.generation = state.generation.wrapping_add(1);
        state.current = Duration::ZERO;
        state.policy = options.policy;
        state.rng = StdRng::seed_from_u64(seed);
        state.epoch = options.epoch;
        state.repository.set_config(options.repository);
        if options.policy.is_random() {
            debug!(policy = %options.policy, seed, carried, "virtual time session started");
        } else {
            debug!(policy = %options.policy, carried, "virtual time session started");
        }
        Ok(())
    }

    /// 结束会话：丢弃所有挂起计时器与排队任务，虚拟时间归零，返回被丢弃的计时器。
    ///
    /// # Errors
    /// - 没有活动会话时返回 [`VirtualTimeError::NotIntercepting`]；
    /// - 在推进回调中调用时返回 [`VirtualTimeError::ConcurrentAdvance`]，会话保持不变，
    ///   外层推进结束后可再次结束会话。
    pub fn end_session(&self) -> Result<Vec<Timer>> {
        let mut state = self.inner.state.lock();
        if !state.active {
            return Err(VirtualTimeError::NotIntercepting);
        }
        if state.advancing {
            return Err(VirtualTimeError::ConcurrentAdvance);
        }
        let mut released = state.repository.release_all();
        released.extend(state.queues.clear());
        state.active = false;
        state.current = Duration::ZERO;
        state.repository.set_config(RepositoryConfig::default());
        debug!(released = released.len(), "virtual time session ended");
        Ok(released)
    }

    pub fn is_intercepting(&self) -> bool {
        self.inner.state.lock().active
    }

    pub fn policy(&self) -> TimerExpirationPolicy {
        self.inner.state.lock().policy
    }

    /// 当前虚拟时间（自会话开始起的偏移）。
    pub fn current_time(&self) -> Duration {
        self.inner.state.lock().current
    }

    /// 会话内返回 `epoch + 虚拟时间`；会话外返回真实系统时间。
    pub fn now(&self) -> SystemTime {
        let state = self.inner.state.lock();
        if !state.active {
            return SystemTime::now();
        }
        state
            .current
            .to_std()
            .and_then(|offset| state.epoch.checked_add(offset))
            .unwrap_or(state.epoch)
    }

    /// 会话内返回虚拟时间；会话外返回引擎创建以来的真实耗时。
    pub fn uptime(&self) -> std::time::Duration {
        let state = self.inner.state.lock();
        if state.active {
            state.current.to_std().unwrap_or_default()
        } else {
            self.inner.created.elapsed()
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        self.uptime().as_secs_f64()
    }

    /// 仓库中挂起的 Timeout/Interval 数量（不含立即任务）。
    pub fn pending_timers(&self) -> usize {
        self.inner.state.lock().repository.len()
    }

    /// 最早挂起计时器的到期时刻。
    pub fn next_due(&self) -> Option<Duration> {
        self.inner
            .state
            .lock()
            .repository
            .peek_earliest()
            .map(Timer::due_time)
    }

    /// 立即任务或微任务队列中是否仍有待执行工作。
    pub fn has_pending_tasks(&self) -> bool {
        !self.inner.state.lock().queues.is_empty()
    }

    pub fn schedule_once(
        &self,
        callback: TimerCallback,
        args: Vec<TimerArg>,
        delay: Duration,
    ) -> TimerId {
        let mut state = self.inner.state.lock();
        let due_time = state.current + delay.clamp_non_negative();
        let uid = state
            .repository
            .insert(Timer::timeout(due_time, callback, args));
        trace!(%uid, %due_time, "timeout scheduled");
        uid
    }

    pub fn schedule_repeating(
        &self,
        callback: TimerCallback,
        args: Vec<TimerArg>,
        period: Duration,
    ) -> TimerId {
        let period = period.max(MIN_REPEAT_PERIOD);
        let mut state = self.inner.state.lock();
        let due_time = state.current + period;
        let uid = state
            .repository
            .insert(Timer::interval(due_time, period, callback, args));
        trace!(%uid, %due_time, %period, "interval scheduled");
        uid
    }

    pub fn schedule_immediate(&self, callback: TimerCallback, args: Vec<TimerArg>) -> TimerId {
        let mut state = self.inner.state.lock();
        let uid = state.repository.allocate_uid();
        let timer = Timer::immediate(state.current, callback, args);
        state.queues.push_immediate(uid, timer);
        uid
    }

    pub fn schedule_microtask(&self, task: Microtask) {
        self.inner.state.lock().queues.push_microtask(task);
    }

    /// 取消计时器或尚未执行的立即任务。
    ///
    /// # Errors
    /// 标识非法且会话开启了 `throwOnInvalidClearTimer` 时返回 [`VirtualTimeError::InvalidUid`]。
    pub fn cancel(&self, uid: TimerId) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.queues.cancel_immediate(uid) {
            state.repository.release_uid(uid);
            return Ok(());
        }
        state.repository.cancel(uid)
    }

    /// 登记单次闭包，`delay` 后触发。
    pub fn set_timeout<F>(&self, delay: Duration, task: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_once(once_callback(task), Vec::new(), delay)
    }

    /// 登记周期闭包，每 `period` 触发一次。
    pub fn set_interval<F>(&self, period: Duration, mut task: F) -> TimerId
    where
        F: FnMut() + Send + 'static,
    {
        self.schedule_repeating(TimerCallback::new(move |_| task()), Vec::new(), period)
    }

    pub fn set_immediate<F>(&self, task: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_immediate(once_callback(task), Vec::new())
    }

    pub fn next_tick<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_microtask(Box::new(task));
    }

    /// 推进虚拟时间 `duration`，按顺序触发期间到期的全部计时器。
    ///
    /// # 执行逻辑（How）
    /// 1. 负值直接拒绝；重入推进返回 `ConcurrentAdvance`；
    /// 2. 排空立即任务/微任务；
    /// 3. 最早到期时刻不晚于目标时刻时，取该时刻的同刻分组，按策略排序后逐个触发，每次触发后再次排空；
    /// 4. 没有到期计时器后，把虚拟时间设为目标时刻。
    ///
    /// # Errors
    /// [`VirtualTimeError::InvalidDuration`] 或 [`VirtualTimeError::ConcurrentAdvance`]；两种情况下虚拟时间均不变。
    pub fn advance(&self, duration: Duration) -> Result<()> {
        if duration.is_negative() {
            return Err(VirtualTimeError::InvalidDuration {
                nanos: duration.as_nanos(),
            });
        }
        let _guard = AdvanceGuard::acquire(&self.inner)?;
        self.advance_by(duration);
        Ok(())
    }

    /// 触发所有 Timeout，途中遇到的 Interval 每次调用至多触发一次。
    ///
    /// # 契约说明（What）
    /// - 每轮先排空队列，再在“全部 Timeout + 本次尚未触发过的 Interval”中取最早的同刻分组触发；
    /// - 已触发过的 Interval 的下一次发生保持挂起（可能因此逾期），留给后续推进处理；
    /// - 没有 Timeout 时立即返回，虚拟时间停在最后一个被触发计时器的到期时刻。
    ///
    /// # 注意事项（Trade-offs）
    /// 周期短于 Timeout 跨度的 Interval 会留下早于当前时间的逾期发生。之后的任何推进（包括
    /// `advance(Duration::ZERO)`）都会按到期顺序连续补发这些发生，直到追上当前时间；补发期间虚拟时间不回退。
    /// 例如 400ms 的 Interval 与 1s 的 Timeout：本调用触发 Interval 一次（400ms）与 Timeout（1s），
    /// 随后的 `advance(Duration::ZERO)` 再补发 800ms 处的一次。
    ///
    /// # Errors
    /// 重入调用返回 [`VirtualTimeError::ConcurrentAdvance`]。
    pub fn expire_all_timeouts(&self) -> Result<()> {
        let _guard = AdvanceGuard::acquire(&self.inner)?;
        let mut fired_intervals: HashSet<TimerId> = HashSet::new();
        loop {
            self.drain();
            let batch = {
                let mut guard = self.inner.state.lock();
                let state = &mut *guard;
                if state.repository.earliest_timeout().is_none() {
                    break;
                }
                let eligible = state.repository.earliest_group_where(|timer| {
                    timer.kind() == TimerKind::Timeout
                        || timer
                            .uid()
                            .is_some_and(|uid| !fired_intervals.contains(&uid))
                });
                let Some((_, mut group)) = eligible else {
                    break;
                };
                state.policy.arrange(&mut group, &mut state.rng);
                group
            };
            fired_intervals.extend(
                batch
                    .iter()
                    .filter(|tied| tied.kind == TimerKind::Interval)
                    .map(|tied| tied.uid),
            );
            self.fire_group(&batch);
        }
        Ok(())
    }

    /// 推进到最近一个计时器的到期时刻并触发该时刻的全部计时器；仓库为空时不做任何事。
    ///
    /// # Errors
    /// 重入调用返回 [`VirtualTimeError::ConcurrentAdvance`]。
    pub fn forward_to_next_timer(&self) -> Result<()> {
        let _guard = AdvanceGuard::acquire(&self.inner)?;
        let delta = {
            let state = self.inner.state.lock();
            match state.repository.peek_earliest() {
                Some(timer) => (timer.due_time() - state.current).clamp_non_negative(),
                None => return Ok(()),
            }
        };
        self.advance_by(delta);
        Ok(())
    }

    /// 返回一个在虚拟时间经过 `delay` 后完成的 Future。
    pub fn sleep(&self, delay: Duration) -> crate::sleep::Sleep {
        crate::sleep::Sleep::register(self, delay)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.inner.state.lock().generation
    }

    /// 仅在登记时所属的会话仍是当前会话时取消。
    pub(crate) fn cancel_in_generation(&self, uid: TimerId, generation: u64) {
        let mut state = self.inner.state.lock();
        if state.generation == generation {
            // 标识若已失效说明计时器已触发，无需处理。
            let _ = state.repository.cancel(uid);
        }
    }

    fn advance_by(&self, duration: Duration) {
        let target = self.inner.state.lock().current + duration;
        trace!(%target, "advancing virtual time");
        loop {
            self.drain();
            let batch = {
                let mut guard = self.inner.state.lock();
                let state = &mut *guard;
                match state.repository.tied_group() {
                    Some((due_time, mut group)) if !due_time.is_longer_than(target) => {
                        state.policy.arrange(&mut group, &mut state.rng);
                        group
                    }
                    _ => break,
                }
            };
            self.fire_group(&batch);
        }

        let mut state = self.inner.state.lock();
        if target.is_longer_than(state.current) {
            state.current = target;
        }
    }

    /// 按既定顺序触发分组；已被取消的成员直接跳过。
    fn fire_group(&self, group: &[TiedTimer]) {
        for tied in group {
            let Some(expired) = self.take_expired(tied.uid) else {
                continue;
            };
            trace!(uid = %tied.uid, kind = ?expired.kind, due = %expired.due_time, "firing timer");
            expired.run();
            self.drain();
        }
    }

    fn take_expired(&self, uid: TimerId) -> Option<ExpiredTimer> {
        let mut state = self.inner.state.lock();
        let expired = state.repository.expire(uid)?;
        if expired.due_time.is_longer_than(state.current) {
            state.current = expired.due_time;
        }
        Some(expired)
    }

    /// 排空微任务与立即任务，直到两条队列同时为空。
    fn drain(&self) {
        loop {
            while let Some(task) = self.next_microtask() {
                task();
            }
            match self.next_immediate() {
                Some(immediate) => immediate.run(),
                None => break,
            }
        }
    }

    fn next_microtask(&self) -> Option<Microtask> {
        self.inner.state.lock().queues.pop_microtask()
    }

    fn next_immediate(&self) -> Option<ExpiredTimer> {
        let mut state = self.inner.state.lock();
        let (uid, immediate) = state.queues.pop_immediate()?;
        state.repository.release_uid(uid);
        Some(immediate)
    }
}

fn once_callback<F>(task: F) -> TimerCallback
where
    F: FnOnce() + Send + 'static,
{
    let mut slot = Some(task);
    TimerCallback::new(move |_| {
        if let Some(task) = slot.take() {
            task();
        }
    })
}
