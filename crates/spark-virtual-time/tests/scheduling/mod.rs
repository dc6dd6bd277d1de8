//! 调度语义集成测试入口，验证虚拟时钟下计时器、立即任务与微任务的相对顺序。
//!
//! # 模块目的（Why）
//! - 汇集所有经由公开 API 驱动引擎的场景测试，便于统一运行与过滤；
//! - 过滤路径与 `cargo test -p spark-virtual-time -- tests::scheduling::*` 对齐。
//!
//! # 结构概览（What）
//! - [`tests::scheduling::timers`]：单次/周期计时器的推进、参数传递、重入与取消；
//! - [`tests::scheduling::ordering`]：排空规则下立即任务、微任务与计时器的交错顺序；
//! - [`tests::scheduling::expiration`]：`expire_all_timeouts` 与 `forward_to_next_timer`；
//! - [`tests::scheduling::session`]：会话生命周期、墙上时间、配置解析与注入接口。
//!
//! # 维护提示（How）
//! - 新增场景时在此登记子模块，并复用 [`tests::scheduling::support`] 中的记录器与会话构造器。

pub mod tests {
    //! 集成测试命名空间：将所有调度相关测试归档在 `tests::scheduling` 之下。
    pub mod scheduling {
        //! 调度语义测试集合。

        pub mod support {
            //! 测试共用的调用记录器与会话构造器。

            use std::sync::Arc;

            use parking_lot::Mutex;
            use spark_virtual_time::{ClockEngine, SessionOptions};

            /// 按触发顺序记录整数标签的共享缓冲区。
            #[derive(Clone, Default)]
            pub struct Calls(Arc<Mutex<Vec<u32>>>);

            impl Calls {
                pub fn push(&self, value: u32) {
                    self.0.lock().push(value);
                }

                /// 返回一个在执行时记录 `value` 的闭包，可用于任意调度入口。
                pub fn recorder(&self, value: u32) -> impl Fn() + Send + Sync + 'static {
                    let calls = self.clone();
                    move || calls.push(value)
                }

                pub fn snapshot(&self) -> Vec<u32> {
                    self.0.lock().clone()
                }
            }

            /// 构造一个已开启会话的引擎。
            pub fn intercepted(options: SessionOptions) -> ClockEngine {
                let engine = ClockEngine::new();
                let resolved = options.resolve().expect("valid session options");
                engine.begin_session(&resolved).expect("begin session");
                engine
            }
        }

        include!("timers.rs");
        include!("ordering.rs");
        include!("expiration.rs");
        include!("session.rs");
    }
}
