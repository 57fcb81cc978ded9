//! Correlation registry.
//!
//! Maps the id of every outbound envelope awaiting a reply to its callback
//! and its timeout timer, both in one entry under one lock. Whoever removes
//! the entry first (the reply path through [`Registry::take`], the timer, or
//! [`Registry::drain`]) owns the callback; the others find nothing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use hublink_protocol::{Envelope, ResultStatus};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use crate::dispatch::Dispatcher;

/// Callback receiving the reply to a correlated envelope.
pub type ReplyCallback = Box<dyn FnOnce(Envelope) + Send + 'static>;

struct PendingRequest {
    callback: ReplyCallback,
    timer: AbortHandle,
}

/// Outstanding correlated requests.
pub(crate) struct Registry {
    runtime: Handle,
    dispatcher: Dispatcher,
    pending: Mutex<HashMap<String, PendingRequest>>,
}

impl Registry {
    pub(crate) fn new(runtime: Handle, dispatcher: Dispatcher) -> Arc<Self> {
        Arc::new(Self {
            runtime,
            dispatcher,
            pending: Mutex::new(HashMap::new()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `callback` under `msgid` and arms its timer.
    ///
    /// When the timer fires first, the callback receives a synthesized
    /// `hResult` with [`ResultStatus::ExecTimeout`].
    pub(crate) fn register(
        self: &Arc<Self>,
        msgid: String,
        timeout: Duration,
        callback: ReplyCallback,
    ) {
        let mut pending = self.lock();

        // The timer cannot look the entry up before it is inserted: both
        // happen under the lock it needs.
        let timer = self
            .runtime
            .spawn(expire(Arc::downgrade(self), msgid.clone(), timeout))
            .abort_handle();

        trace!(msgid = %msgid, timeout_ms = timeout.as_millis() as u64, "request registered");
        if let Some(replaced) = pending.insert(msgid, PendingRequest { callback, timer }) {
            replaced.timer.abort();
        }
    }

    /// Removes the entry for `key`, cancelling its timer.
    pub(crate) fn take(&self, key: &str) -> Option<ReplyCallback> {
        let request = self.lock().remove(key)?;
        request.timer.abort();
        Some(request.callback)
    }

    /// Removes every entry, cancelling all timers.
    pub(crate) fn drain(&self) -> Vec<(String, ReplyCallback)> {
        self.lock()
            .drain()
            .map(|(msgid, request)| {
                request.timer.abort();
                (msgid, request.callback)
            })
            .collect()
    }

    /// Number of outstanding requests.
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn remove_expired(&self, msgid: &str) -> Option<ReplyCallback> {
        self.lock().remove(msgid).map(|request| request.callback)
    }
}

async fn expire(registry: Weak<Registry>, msgid: String, timeout: Duration) {
    tokio::time::sleep(timeout).await;

    let Some(registry) = registry.upgrade() else {
        return;
    };
    let Some(callback) = registry.remove_expired(&msgid) else {
        return;
    };

    debug!(msgid = %msgid, timeout_ms = timeout.as_millis() as u64, "request timed out");
    let reply = Envelope::result_error(
        msgid,
        ResultStatus::ExecTimeout,
        format!("no reply within {}ms", timeout.as_millis()),
    );
    registry
        .dispatcher
        .dispatch("reply timeout", move || callback(reply));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn registry() -> Arc<Registry> {
        let runtime = Handle::current();
        let dispatcher = Dispatcher::spawn(&runtime);
        Registry::new(runtime, dispatcher)
    }

    fn recorder() -> (ReplyCallback, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: ReplyCallback = Box::new(move |envelope| {
            let _ = tx.send(envelope);
        });
        (callback, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn timer_delivers_exec_timeout_once() {
        let registry = registry();
        let (callback, mut replies) = recorder();
        registry.register("m-1".to_string(), Duration::from_millis(5000), callback);

        tokio::time::advance(Duration::from_millis(4999)).await;
        assert_eq!(registry.len(), 1);

        tokio::time::advance(Duration::from_millis(2)).await;
        let reply = replies.recv().await.unwrap();
        assert_eq!(reply.reference.as_deref(), Some("m-1"));
        assert_eq!(reply.result().unwrap().status, ResultStatus::ExecTimeout);
        assert_eq!(registry.len(), 0);

        // The callback was consumed, so its sender is gone.
        assert!(replies.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn take_cancels_the_timer() {
        let registry = registry();
        let (callback, mut replies) = recorder();
        registry.register("m-2".to_string(), Duration::from_millis(5000), callback);

        tokio::time::advance(Duration::from_millis(4990)).await;
        let callback = registry.take("m-2").unwrap();
        assert!(registry.take("m-2").is_none());

        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert!(replies.try_recv().is_err());

        callback(Envelope::default());
        assert!(replies.recv().await.is_some());
    }

    #[tokio::test]
    async fn drain_empties_the_registry() {
        let registry = registry();
        for id in ["a", "b", "c"] {
            let (callback, _rx) = recorder();
            registry.register(id.to_string(), Duration::from_secs(60), callback);
        }

        let mut drained: Vec<String> = registry.drain().into_iter().map(|(id, _)| id).collect();
        drained.sort();
        assert_eq!(drained, vec!["a", "b", "c"]);
        assert_eq!(registry.len(), 0);
        assert!(registry.take("a").is_none());
    }
}
