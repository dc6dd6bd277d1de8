pub mod timers {
    //! 单次与周期计时器的推进语义。
    //!
    //! # 测试目标（Why）
    //! - 计时器只在推进跨过其到期时刻时触发，且严格按到期时刻先后执行；
    //! - 回调中登记的新计时器同样参与本次推进；
    //! - 重入推进被拒绝，外层推进不受影响。

    use std::sync::Arc;

    use parking_lot::Mutex;
    use spark_virtual_time::{
        Duration, SessionOptions, TimerCallback, TimerId, VirtualTimeError, arg,
    };

    use super::support::{Calls, intercepted};

    #[test]
    fn expires_timers_in_due_order() {
        let engine = intercepted(SessionOptions::new());
        let calls = Calls::default();
        engine.set_timeout(Duration::milliseconds(1100), calls.recorder(2));
        engine.set_timeout(Duration::milliseconds(50), calls.recorder(1));

        engine.advance(Duration::milliseconds(1000)).expect("advance");
        assert_eq!(calls.snapshot(), vec![1]);
        engine.advance(Duration::milliseconds(500)).expect("advance");
        assert_eq!(calls.snapshot(), vec![1, 2]);
        assert_eq!(engine.current_time(), Duration::milliseconds(1500));
    }

    #[test]
    fn does_not_expire_before_due_time() {
        let engine = intercepted(SessionOptions::new());
        let calls = Calls::default();
        engine.set_timeout(Duration::milliseconds(100), calls.recorder(1));

        engine.advance(Duration::milliseconds(50)).expect("advance");
        assert!(calls.snapshot().is_empty());
        engine.advance(Duration::milliseconds(50)).expect("advance");
        assert_eq!(calls.snapshot(), vec![1]);
    }

    #[test]
    fn negative_advance_is_rejected() {
        let engine = intercepted(SessionOptions::new());
        assert_eq!(
            engine.advance(Duration::milliseconds(-1)),
            Err(VirtualTimeError::InvalidDuration { nanos: -1_000_000 })
        );
        assert_eq!(engine.current_time(), Duration::ZERO);
    }

    #[test]
    fn passes_registered_arguments_to_callback() {
        let engine = intercepted(SessionOptions::new());
        let calls = Calls::default();
        let sink = calls.clone();
        engine.schedule_once(
            TimerCallback::new(move |args| {
                for value in args.iter().filter_map(|item| item.downcast_ref::<u32>()) {
                    sink.push(*value);
                }
            }),
            vec![arg(2_u32), arg(5_u32)],
            Duration::milliseconds(50),
        );

        engine.advance(Duration::milliseconds(50)).expect("advance");
        assert_eq!(calls.snapshot(), vec![2, 5]);
    }

    #[test]
    fn timers_registered_by_callbacks_fire_within_same_advance() {
        let engine = intercepted(SessionOptions::new());
        let calls = Calls::default();
        let inner = engine.clone();
        let first = calls.recorder(1);
        let second = calls.recorder(2);
        engine.set_timeout(Duration::milliseconds(50), move || {
            first();
            inner.set_timeout(Duration::milliseconds(50), second);
        });

        engine.advance(Duration::milliseconds(150)).expect("advance");
        assert_eq!(calls.snapshot(), vec![1, 2]);
        assert_eq!(engine.pending_timers(), 0);
    }

    #[test]
    fn reentrant_advance_is_rejected_and_outer_advance_completes() {
        let engine = intercepted(SessionOptions::new());
        let observed = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&observed);
        let inner = engine.clone();
        engine.set_timeout(Duration::milliseconds(50), move || {
            *slot.lock() = Some(inner.advance(Duration::milliseconds(100)));
        });

        engine.advance(Duration::milliseconds(100)).expect("outer advance");
        assert_eq!(
            *observed.lock(),
            Some(Err(VirtualTimeError::ConcurrentAdvance))
        );
        assert_eq!(engine.current_time(), Duration::milliseconds(100));
        assert!(engine.advance(Duration::milliseconds(1)).is_ok(), "守卫应已释放");
    }

    #[test]
    fn interval_fires_once_per_period() {
        let engine = intercepted(SessionOptions::new());
        let calls = Calls::default();
        engine.set_interval(Duration::milliseconds(100), calls.recorder(1));
        engine.set_timeout(Duration::milliseconds(250), calls.recorder(2));

        engine.advance(Duration::milliseconds(100)).expect("advance");
        assert_eq!(calls.snapshot(), vec![1]);
        engine.advance(Duration::milliseconds(100)).expect("advance");
        assert_eq!(calls.snapshot(), vec![1, 1]);
        engine.advance(Duration::milliseconds(100)).expect("advance");
        assert_eq!(calls.snapshot(), vec![1, 1, 2, 1]);
        assert_eq!(engine.pending_timers(), 1);
    }

    #[test]
    fn interval_keeps_its_handle_and_can_cancel_itself() {
        let engine = intercepted(SessionOptions::new().with_throw_on_invalid_clear_timer(true));
        let calls = Calls::default();
        let handle: Arc<Mutex<Option<TimerId>>> = Arc::new(Mutex::new(None));

        let inner = engine.clone();
        let own = Arc::clone(&handle);
        let sink = calls.clone();
        let mut fired = 0;
        let uid = engine.set_interval(Duration::milliseconds(10), move || {
            fired += 1;
            sink.push(fired);
            if fired == 2 {
                if let Some(uid) = *own.lock() {
                    inner.cancel(uid).expect("interval handle stays valid");
                }
            }
        });
        *handle.lock() = Some(uid);

        engine.advance(Duration::milliseconds(100)).expect("advance");
        assert_eq!(calls.snapshot(), vec![1, 2]);
        assert_eq!(engine.pending_timers(), 0);
    }

    #[test]
    fn cancelling_a_tied_timer_from_an_earlier_member_skips_it() {
        let engine = intercepted(SessionOptions::new());
        let calls = Calls::default();
        let victim: Arc<Mutex<Option<TimerId>>> = Arc::new(Mutex::new(None));

        let inner = engine.clone();
        let target = Arc::clone(&victim);
        let first = calls.recorder(1);
        engine.set_timeout(Duration::milliseconds(100), move || {
            first();
            if let Some(uid) = *target.lock() {
                inner.cancel(uid).expect("pending timer");
            }
        });
        let uid = engine.set_timeout(Duration::milliseconds(100), calls.recorder(2));
        *victim.lock() = Some(uid);

        engine.advance(Duration::milliseconds(100)).expect("advance");
        assert_eq!(calls.snapshot(), vec![1]);
    }

    #[test]
    fn interval_reaching_the_end_of_time_fires_once_and_stops() {
        let engine = intercepted(SessionOptions::new());
        let calls = Calls::default();
        let sink = calls.clone();
        let inner = engine.clone();
        let handle: Arc<Mutex<Option<TimerId>>> = Arc::new(Mutex::new(None));
        let own = Arc::clone(&handle);
        let mut fired = 0;
        let uid = engine.set_interval(Duration::nanoseconds(i64::MAX), move || {
            fired += 1;
            sink.push(fired);
            // 退化为原地重复时主动取消，避免测试挂起。
            if fired > 3 {
                if let Some(uid) = *own.lock() {
                    let _ = inner.cancel(uid);
                }
            }
        });
        *handle.lock() = Some(uid);

        engine
            .advance(Duration::nanoseconds(i64::MAX))
            .expect("advance terminates");
        assert_eq!(calls.snapshot(), vec![1]);
        assert_eq!(engine.pending_timers(), 0);
        assert_eq!(engine.current_time(), Duration::nanoseconds(i64::MAX));
    }

    #[test]
    fn negative_delay_fires_on_next_advance() {
        let engine = intercepted(SessionOptions::new());
        let calls = Calls::default();
        engine.set_timeout(Duration::milliseconds(-20), calls.recorder(1));
        assert_eq!(engine.next_due(), Some(Duration::ZERO));

        engine.advance(Duration::ZERO).expect("advance");
        assert_eq!(calls.snapshot(), vec![1]);
    }
}
