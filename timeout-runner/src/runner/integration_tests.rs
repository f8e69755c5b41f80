//! End-to-end tests for the timeout task runner.

#[cfg(test)]
mod tests {
    use crate::clock::{ManualClock, SystemClock};
    use crate::config::RunnerConfig;
    use crate::runner::TimeoutTaskRunner;
    use crate::task::TaskId;
    use crate::testing::CallbackRecorder;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use rand::Rng;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const TICK: Duration = Duration::from_millis(10);
    /// Long enough for several scanner ticks.
    const SETTLE: Duration = Duration::from_millis(80);
    const WAIT: Duration = Duration::from_secs(5);

    fn fast_runner<K>(name: &str) -> (Arc<ManualClock>, TimeoutTaskRunner<K>)
    where
        K: Eq + std::hash::Hash + Clone + Send + 'static,
    {
        let clock = Arc::new(ManualClock::new(10_000));
        let config = RunnerConfig::new()
            .with_scan_interval(TICK)
            .with_shutdown_timeout(Duration::from_secs(2))
            .with_thread_name(name);
        let runner = TimeoutTaskRunner::with_clock(config, clock.clone()).unwrap();
        (clock, runner)
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_zero_timeout_fires_on_first_tick_with_key_and_context() {
        let (_, runner) = fast_runner("zero-timeout");
        let recorder = CallbackRecorder::new();

        runner.add_with_context("conn-1".to_string(), 0, recorder.callback(), "idle");
        runner.add("conn-2".to_string(), 0, recorder.callback());

        assert!(recorder.wait_for_calls(2, WAIT));
        assert_eq!(
            recorder.calls(),
            vec![
                ("conn-1".to_string(), Some("idle".to_string())),
                ("conn-2".to_string(), None),
            ]
        );
        assert_eq!(runner.pending_count(), 0);
        assert!(runner.stop());
    }

    #[test]
    fn test_not_fired_before_deadline() {
        let (clock, runner) = fast_runner("before-deadline");
        let recorder = CallbackRecorder::new();
        let id = runner.add("k".to_string(), 3, recorder.callback());
        assert_eq!(runner.next_deadline(), Some(10_003));

        clock.advance(2);
        std::thread::sleep(SETTLE);
        assert_eq!(recorder.count(), 0);
        assert!(runner.is_pending(id));

        clock.advance(1);
        assert!(recorder.wait_for_calls(1, WAIT));
        assert!(!runner.is_pending(id));
    }

    #[test]
    fn test_cancel_by_id_before_deadline_never_fires() {
        let (clock, runner) = fast_runner("cancel-id");
        let recorder = CallbackRecorder::new();
        let cancelled = runner.add("a".to_string(), 1, recorder.callback());
        runner.add("b".to_string(), 1, recorder.callback());

        assert!(runner.remove_by_task_id(cancelled));
        clock.advance(5);

        assert!(recorder.wait_for_calls(1, WAIT));
        std::thread::sleep(SETTLE);
        assert_eq!(recorder.calls(), vec![("b".to_string(), None)]);
    }

    #[test]
    fn test_cancel_by_key_removes_all_tasks_for_key() {
        let (clock, runner) = fast_runner("cancel-key");
        let recorder = CallbackRecorder::new();
        for timeout in 1..=5 {
            runner.add("shared".to_string(), timeout, recorder.callback());
        }
        runner.add("other".to_string(), 5, recorder.callback());

        assert_eq!(runner.remove_by_object_key(&"shared".to_string()), 5);
        clock.advance(10);

        assert!(recorder.wait_for_calls(1, WAIT));
        std::thread::sleep(SETTLE);
        assert_eq!(recorder.calls(), vec![("other".to_string(), None)]);
    }

    #[test]
    fn test_cancel_unknown_or_fired_is_noop() {
        let (_, runner) = fast_runner("cancel-unknown");
        let recorder = CallbackRecorder::new();

        assert!(!runner.remove_by_task_id(TaskId::new(12_345)));
        assert_eq!(runner.remove_by_object_key(&"never".to_string()), 0);

        let fired = runner.add("k".to_string(), 0, recorder.callback());
        assert!(recorder.wait_for_calls(1, WAIT));
        assert!(!runner.remove_by_task_id(fired));
        assert!(!runner.remove_by_task_id(fired));
        assert_eq!(runner.remove_by_object_key(&"k".to_string()), 0);
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn test_same_deadline_runs_in_registration_order() {
        let (clock, runner) = fast_runner("fifo");
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["A", "B", "C"] {
            let order = order.clone();
            runner.add(name.to_string(), 1, move |key, _| {
                order.lock().push(format!("{key}:start"));
                std::thread::sleep(Duration::from_millis(5));
                order.lock().push(format!("{key}:end"));
            });
        }
        clock.advance(1);

        assert!(wait_until(|| order.lock().len() == 6));
        assert_eq!(
            *order.lock(),
            vec!["A:start", "A:end", "B:start", "B:end", "C:start", "C:end"]
        );
    }

    #[test]
    fn test_slow_callback_does_not_block_registry() {
        let (clock, runner) = fast_runner("slow-callback");
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let entered = Arc::new(AtomicU32::new(0));
        {
            let entered = entered.clone();
            runner.add("slow".to_string(), 0, move |_, _| {
                entered.fetch_add(1, Ordering::SeqCst);
                let _ = release_rx.recv_timeout(WAIT);
            });
        }
        assert!(wait_until(|| entered.load(Ordering::SeqCst) == 1));

        let recorder = CallbackRecorder::new();
        let id = runner.add("fast".to_string(), 10, recorder.callback());
        assert!(runner.remove_by_task_id(id));
        let kept = runner.add("fast".to_string(), 1, recorder.callback());
        clock.advance(1);
        assert!(wait_until(|| runner.queued_count() == 1));
        assert!(!runner.is_pending(kept));

        release_tx.send(()).unwrap();
        assert!(recorder.wait_for_calls(1, WAIT));
    }

    #[test]
    fn test_panicking_callback_does_not_stop_later_ones() {
        let (clock, runner) = fast_runner("panic");
        let recorder = CallbackRecorder::new();

        runner.add("bad".to_string(), 1, |_, _| panic!("boom"));
        runner.add("good".to_string(), 1, recorder.callback());
        clock.advance(1);

        assert!(recorder.wait_for_calls(1, WAIT));
        assert!(wait_until(|| runner.metrics().dispatched() == 2));
        assert_eq!(runner.metrics().failed(), 1);
        assert_eq!(runner.metrics().completed(), 1);
    }

    #[test]
    fn test_stop_discards_pending_tasks() {
        let (clock, runner) = fast_runner("stop");
        let recorder = CallbackRecorder::new();
        runner.add("k".to_string(), 5, recorder.callback());
        runner.add("k".to_string(), 6, recorder.callback());

        assert!(runner.stop());
        assert_eq!(runner.pending_count(), 0);
        clock.advance(10);
        std::thread::sleep(SETTLE);
        assert_eq!(recorder.count(), 0);
        assert!(runner.stop());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = RunnerConfig::new().with_scan_interval(Duration::ZERO);
        assert!(TimeoutTaskRunner::<String>::with_config(config).is_err());
    }

    #[test]
    fn test_job_1_fires_once_after_timeout() {
        let config = RunnerConfig::new().with_thread_name("job-1");
        let runner = TimeoutTaskRunner::with_clock(config, Arc::new(SystemClock)).unwrap();
        let recorder = CallbackRecorder::new();

        runner.add_with_context("job-1".to_string(), 1, recorder.callback(), "ctx-1");

        assert!(recorder.wait_for_calls(1, Duration::from_secs(4)));
        std::thread::sleep(Duration::from_millis(1_100));
        assert_eq!(
            recorder.calls(),
            vec![("job-1".to_string(), Some("ctx-1".to_string()))]
        );
    }

    #[test]
    fn test_job_2_cancelled_after_one_second_never_fires() {
        let (clock, runner) = fast_runner("job-2");
        let recorder = CallbackRecorder::new();
        runner.add("job-2".to_string(), 5, recorder.callback());

        clock.advance(1);
        std::thread::sleep(SETTLE);
        runner.remove_by_object_key(&"job-2".to_string());

        clock.advance(5);
        std::thread::sleep(SETTLE);
        assert_eq!(recorder.count(), 0);
        assert_eq!(runner.metrics().enqueued(), 0);
    }

    #[test]
    fn test_job_3_partial_fire_then_cancel() {
        let (clock, runner) = fast_runner("job-3");
        let recorder = CallbackRecorder::new();
        for timeout in 1..=3 {
            runner.add_with_context(
                "job-3".to_string(),
                timeout,
                recorder.callback(),
                format!("after-{timeout}s"),
            );
        }

        clock.advance(1);
        assert!(recorder.wait_for_calls(1, WAIT));
        assert_eq!(runner.remove_by_object_key(&"job-3".to_string()), 2);

        clock.advance(5);
        std::thread::sleep(SETTLE);
        assert_eq!(
            recorder.calls(),
            vec![("job-3".to_string(), Some("after-1s".to_string()))]
        );
    }

    #[test]
    fn test_stress_concurrent_registration_fires_exactly_once() {
        const CALLERS: usize = 10;
        const PER_CALLER: usize = 1_000;
        const TOTAL: usize = CALLERS * PER_CALLER;

        let (clock, runner) = fast_runner::<usize>("stress");
        let runner = Arc::new(runner);
        let fired: Arc<Vec<AtomicU32>> = Arc::new((0..TOTAL).map(|_| AtomicU32::new(0)).collect());

        let callers: Vec<_> = (0..CALLERS)
            .map(|caller| {
                let runner = runner.clone();
                let fired = fired.clone();
                std::thread::spawn(move || {
                    let mut rng = rand::thread_rng();
                    let mut cancelled = Vec::new();
                    for i in 0..PER_CALLER {
                        let key = caller * PER_CALLER + i;
                        let fired = fired.clone();
                        let id = runner.add(key, rng.gen_range(1..=10), move |key, _| {
                            fired[key].fetch_add(1, Ordering::SeqCst);
                        });
                        if i % 7 == 0 && runner.remove_by_task_id(id) {
                            cancelled.push(key);
                        }
                    }
                    cancelled
                })
            })
            .collect();

        let mut cancelled = Vec::new();
        for caller in callers {
            cancelled.extend(caller.join().unwrap());
        }

        for _ in 0..10 {
            clock.advance(1);
            std::thread::sleep(Duration::from_millis(20));
        }

        let expected = (TOTAL - cancelled.len()) as u64;
        assert!(wait_until(|| runner.metrics().completed() == expected));
        std::thread::sleep(SETTLE);

        for key in &cancelled {
            assert_eq!(fired[*key].load(Ordering::SeqCst), 0, "cancelled task {key} fired");
        }
        let fired_total: u32 = fired.iter().map(|f| f.load(Ordering::SeqCst)).sum();
        assert_eq!(fired_total as u64, expected);
        assert!(fired.iter().all(|f| f.load(Ordering::SeqCst) <= 1));
        assert_eq!(runner.pending_count(), 0);
    }

    #[test]
    fn test_cancel_racing_expiry_is_fired_xor_cancelled() {
        let (clock, runner) = fast_runner::<usize>("race");
        let fired: Arc<Vec<AtomicU32>> = Arc::new((0..2_000).map(|_| AtomicU32::new(0)).collect());

        let ids: Vec<_> = (0..2_000)
            .map(|key| {
                let fired = fired.clone();
                runner.add(key, 1, move |key, _| {
                    fired[key].fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        clock.advance(1);
        let cancelled: Vec<bool> = ids.iter().map(|id| runner.remove_by_task_id(*id)).collect();

        let expected = cancelled.iter().filter(|c| !**c).count() as u64;
        assert!(wait_until(|| runner.metrics().completed() == expected));
        std::thread::sleep(SETTLE);

        for (key, was_cancelled) in cancelled.iter().enumerate() {
            let count = fired[key].load(Ordering::SeqCst);
            if *was_cancelled {
                assert_eq!(count, 0, "task {key} both cancelled and fired");
            } else {
                assert_eq!(count, 1, "task {key} neither cancelled nor fired once");
            }
        }
    }
}
