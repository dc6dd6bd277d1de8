//! 立即任务与微任务两条 FIFO 队列。
//!
//! 排空规则与宿主事件循环一致：先执行全部微任务（包括执行过程中新加入的），再取出一个立即任务执行，
//! 如此往复直到两条队列同时为空。队列本身只负责存取，执行由引擎在释放状态锁之后完成。

use std::collections::VecDeque;

use crate::timer::{ExpiredTimer, Timer};
use crate::uid::TimerId;

/// 微任务闭包。
pub type Microtask = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub(crate) struct TaskQueues {
    immediates: VecDeque<(TimerId, Timer)>,
    microtasks: VecDeque<Microtask>,
}

impl TaskQueues {
    pub(crate) fn push_immediate(&mut self, uid: TimerId, timer: Timer) {
        self.immediates.push_back((uid, timer));
    }

    pub(crate) fn push_microtask(&mut self, task: Microtask) {
        self.microtasks.push_back(task);
    }

    pub(crate) fn pop_microtask(&mut self) -> Option<Microtask> {
        self.microtasks.pop_front()
    }

    pub(crate) fn pop_immediate(&mut self) -> Option<(TimerId, ExpiredTimer)> {
        self.immediates
            .pop_front()
            .map(|(uid, timer)| (uid, timer.into_expired()))
    }

    /// 移除尚未执行的立即任务；返回是否命中。
    pub(crate) fn cancel_immediate(&mut self, uid: TimerId) -> bool {
        match self.immediates.iter().position(|(queued, _)| *queued == uid) {
            Some(index) => {
                self.immediates.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.immediates.is_empty() && self.microtasks.is_empty()
    }

    /// 丢弃两条队列中的全部任务，返回被丢弃的立即任务。
    pub(crate) fn clear(&mut self) -> Vec<Timer> {
        self.microtasks.clear();
        self.immediates.drain(..).map(|(_, timer)| timer).collect()
    }
}

impl core::fmt::Debug for TaskQueues {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TaskQueues")
            .field("immediates", &self.immediates.len())
            .field("microtasks", &self.microtasks.len())
            .finish()
    }
}
