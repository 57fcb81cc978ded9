//! Callback dispatcher.
//!
//! Producers (the state machine, the transport reader, reply timers) hand
//! callbacks to a [`Dispatcher`] and return at once. A single worker drains
//! the queue in FIFO order and runs each callback on the blocking pool, so a
//! slow callback delays later callbacks but never a producer, and a
//! panicking one is logged and forgotten.
//!
//! The queue is bounded. When it is full the new callback is dropped with an
//! error log instead of blocking the producer.

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};

/// Callbacks that may wait in the queue before new ones are dropped.
const QUEUE_CAPACITY: usize = 4096;

struct Job {
    label: &'static str,
    run: Box<dyn FnOnce() + Send + 'static>,
}

/// Queue of callbacks waiting to run.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    queue: mpsc::Sender<Job>,
}

impl Dispatcher {
    /// Starts the worker on `runtime`. It stops once every handle is dropped.
    pub(crate) fn spawn(runtime: &Handle) -> Self {
        Self::with_capacity(runtime, QUEUE_CAPACITY)
    }

    fn with_capacity(runtime: &Handle, capacity: usize) -> Self {
        let (queue, jobs) = mpsc::channel(capacity);
        runtime.spawn(run(jobs));
        Self { queue }
    }

    /// Queues `callback`; `label` names it in logs.
    pub(crate) fn dispatch(&self, label: &'static str, callback: impl FnOnce() + Send + 'static) {
        let job = Job {
            label,
            run: Box::new(callback),
        };
        match self.queue.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => error!(label, "dispatch queue full, dropping callback"),
            Err(TrySendError::Closed(_)) => warn!(label, "dispatcher stopped, dropping callback"),
        }
    }
}

async fn run(mut jobs: mpsc::Receiver<Job>) {
    while let Some(Job { label, run }) = jobs.recv().await {
        match tokio::task::spawn_blocking(run).await {
            Ok(()) => {}
            Err(e) if e.is_panic() => error!(label, "callback panicked"),
            Err(e) => warn!(label, error = %e, "callback did not complete"),
        }
    }
    debug!("dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn callbacks_run_in_order() {
        let dispatcher = Dispatcher::spawn(&Handle::current());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        for i in 0..10 {
            let seen = Arc::clone(&seen);
            dispatcher.dispatch("test", move || seen.lock().unwrap().push(i));
        }
        dispatcher.dispatch("test", move || done_tx.send(()).unwrap());

        done_rx.recv().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn panicking_callback_does_not_stop_the_worker() {
        let dispatcher = Dispatcher::spawn(&Handle::current());
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatcher.dispatch("boom", || panic!("callback failure"));
        dispatcher.dispatch("after", move || tx.send("still running").unwrap());

        let got = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(got, Some("still running"));
    }

    #[tokio::test]
    async fn dispatch_does_not_wait_for_slow_callbacks() {
        let dispatcher = Dispatcher::spawn(&Handle::current());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let started = std::time::Instant::now();
        dispatcher.dispatch("slow", || std::thread::sleep(Duration::from_millis(200)));
        dispatcher.dispatch("fast", move || tx.send(()).unwrap());
        assert!(started.elapsed() < Duration::from_millis(100));

        rx.recv().await.unwrap();
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let dispatcher = Dispatcher::with_capacity(&Handle::current(), 1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        dispatcher.dispatch("blocker", move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        });
        started_rx.recv().await.unwrap();

        let queued = Arc::clone(&seen);
        dispatcher.dispatch("queued", move || {
            queued.lock().unwrap().push("queued");
            done_tx.send(()).unwrap();
        });
        let dropped = Arc::clone(&seen);
        dispatcher.dispatch("dropped", move || dropped.lock().unwrap().push("dropped"));

        release_tx.send(()).unwrap();
        done_rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["queued"]);
    }
}
