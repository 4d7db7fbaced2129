#![allow(dead_code)]

use std::{
    sync::atomic::{AtomicUsize, Ordering::SeqCst},
    time::Duration,
};

use bounded_dispatch::Dispatcher;

/// Assert that a given duration has elapsed since `start`, within the given tolerance.
macro_rules! assert_elapsed {
    ($start:expr, $dur:expr, $tolerance:expr) => {{
        let elapsed = $start.elapsed();
        let lower: std::time::Duration = $dur;

        // Handles ms rounding
        assert!(
            elapsed >= lower && elapsed <= lower + $tolerance,
            "actual = {:?}, expected = {:?}",
            elapsed,
            lower
        );
    }};
}

pub(crate) fn trace_init() -> tracing::subscriber::DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .with_thread_names(true)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// Wait until every admitted unit of work has finished and released its slot.
pub(crate) async fn until_idle(dispatcher: &Dispatcher) {
    while !is_idle(dispatcher) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// Like [until_idle], for synchronous callers.
pub(crate) fn blocking_until_idle(dispatcher: &Dispatcher) {
    while !is_idle(dispatcher) {
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn is_idle(dispatcher: &Dispatcher) -> bool {
    let state = dispatcher.state();
    state.in_flight() == 0 && state.available() == state.capacity()
}

/// Tracks how many units of work are running, and the most seen at once.
#[derive(Debug, Default)]
pub(crate) struct Concurrency {
    running: AtomicUsize,
    max: AtomicUsize,
    finished: AtomicUsize,
}

impl Concurrency {
    pub(crate) fn start(&self) {
        let now = self.running.fetch_add(1, SeqCst) + 1;
        self.max.fetch_max(now, SeqCst);
    }

    pub(crate) fn finish(&self) {
        self.running.fetch_sub(1, SeqCst);
        self.finished.fetch_add(1, SeqCst);
    }

    pub(crate) fn max(&self) -> usize {
        self.max.load(SeqCst)
    }

    pub(crate) fn finished(&self) -> usize {
        self.finished.load(SeqCst)
    }
}
