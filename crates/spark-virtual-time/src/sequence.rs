/// 会话内严格递增的序号发生器，仅用于同一到期时刻内的稳定排序。
///
/// Interval 计时器每次重新入队都会拿到新序号，因此会排在上一次触发之后登记的同刻计时器后面。
#[derive(Debug, Default)]
pub struct SequenceGenerator {
    next: u64,
}

impl SequenceGenerator {
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    pub fn generate(&mut self) -> u64 {
        let value = self.next;
        self.next = self.next.saturating_add(1);
        value
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}
