//! 绑定虚拟时钟的睡眠 Future。
//!
//! # 教案式说明
//! - **意图 (Why)**：异步业务代码通常以 `sleep(d).await` 表达等待，测试中需要让它跟随虚拟时间完成，
//!   而不是阻塞真实线程；
//! - **实现逻辑 (How)**：构造时向引擎登记一个单次计时器，回调将完成位置真并唤醒登记的 waker；
//!   `poll` 未完成时记录最新 waker 并返回 `Pending`；
//! - **契约 (What)**：Future 在计时器触发前保持 `Pending`；提前 Drop 会取消对应计时器，
//!   且只在登记时所属的会话内取消，不会误伤新会话中复用的标识。

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::duration::Duration;
use crate::engine::ClockEngine;
use crate::timer::TimerCallback;
use crate::uid::TimerId;

/// 在虚拟时间经过指定跨度后完成的 Future。
#[derive(Debug)]
pub struct Sleep {
    engine: ClockEngine,
    state: Arc<SleepState>,
    uid: TimerId,
    generation: u64,
}

#[derive(Debug, Default)]
struct SleepState {
    completed: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl SleepState {
    fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    fn store_waker(&self, waker: &Waker) {
        let mut slot = self.waker.lock();
        if slot
            .as_ref()
            .is_some_and(|existing| existing.will_wake(waker))
        {
            return;
        }
        *slot = Some(waker.clone());
    }

    fn finish(&self) {
        self.completed.store(true, Ordering::Release);
        let waker = self.waker.lock().take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl Sleep {
    pub(crate) fn register(engine: &ClockEngine, delay: Duration) -> Self {
        let state = Arc::new(SleepState::default());
        let timer_state = Arc::clone(&state);
        let generation = engine.generation();
        let uid = engine.schedule_once(
            TimerCallback::new(move |_| timer_state.finish()),
            Vec::new(),
            delay,
        );
        Self {
            engine: engine.clone(),
            state,
            uid,
            generation,
        }
    }

    /// 底层计时器标识。
    pub fn timer_id(&self) -> TimerId {
        self.uid
    }

    pub fn is_elapsed(&self) -> bool {
        self.state.is_completed()
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.state.is_completed() {
            return Poll::Ready(());
        }
        self.state.store_waker(cx.waker());
        if self.state.is_completed() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if !self.state.is_completed() {
            self.state.waker.lock().take();
            self.engine.cancel_in_generation(self.uid, self.generation);
        }
    }
}
