//! The hublink client.
//!
//! A [`Client`] owns one session. Status changes and unsolicited envelopes
//! reach the callbacks registered with [`Client::on_status`] and
//! [`Client::on_message`]; replies reach the callback passed to
//! [`Client::send`]. Every callback runs on the dispatcher, never on the
//! caller or the transport.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use chrono::Utc;
use hublink_core::{ConnectionError, ConnectionStatus, Identity, StatusEvent, pick_endpoint};
use hublink_protocol::{DATA_TYPE_MESSAGE, Envelope, ResultStatus};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ClientOptions;
use crate::dispatch::Dispatcher;
use crate::error::{ClientError, ClientResult};
use crate::registry::{Registry, ReplyCallback};
use crate::session::Session;
use crate::transport::{Transport, TransportDelegate, TransportOptions};

type StatusCallback = Arc<dyn Fn(StatusEvent) + Send + Sync>;
type MessageCallback = Arc<dyn Fn(Envelope) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    status: Option<StatusCallback>,
    message: Option<MessageCallback>,
}

struct Inner {
    options: ClientOptions,
    transport: Arc<dyn Transport>,
    session: Session,
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    identity: Mutex<Option<Identity>>,
    callbacks: Mutex<Callbacks>,
}

/// Client session handle. Cloning shares the session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Creates a client using the transport named in `options`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(options: ClientOptions) -> ClientResult<Self> {
        let runtime = Handle::try_current().map_err(|e| ClientError::Runtime(e.to_string()))?;
        let transport = options.transport.build(runtime.clone());
        Ok(Self::build(options, transport, runtime))
    }

    /// Creates a client on top of a custom transport.
    pub fn with_transport(
        options: ClientOptions,
        transport: Arc<dyn Transport>,
    ) -> ClientResult<Self> {
        let runtime = Handle::try_current().map_err(|e| ClientError::Runtime(e.to_string()))?;
        Ok(Self::build(options, transport, runtime))
    }

    fn build(options: ClientOptions, transport: Arc<dyn Transport>, runtime: Handle) -> Self {
        let dispatcher = Dispatcher::spawn(&runtime);
        let registry = Registry::new(runtime, dispatcher.clone());
        Self {
            inner: Arc::new(Inner {
                options,
                transport,
                session: Session::default(),
                registry,
                dispatcher,
                identity: Mutex::new(None),
                callbacks: Mutex::new(Callbacks::default()),
            }),
        }
    }

    /// Returns the options the client was built with.
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Returns the current session status.
    pub fn status(&self) -> ConnectionStatus {
        self.inner.session.status()
    }

    /// Returns the identity of the last connect attempt.
    pub fn identity(&self) -> Option<Identity> {
        self.inner
            .identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Registers the status callback, replacing any previous one.
    pub fn on_status(&self, callback: impl Fn(StatusEvent) + Send + Sync + 'static) {
        self.inner.callbacks().status = Some(Arc::new(callback));
    }

    /// Registers the callback for uncorrelated envelopes, replacing any
    /// previous one.
    pub fn on_message(&self, callback: impl Fn(Envelope) + Send + Sync + 'static) {
        self.inner.callbacks().message = Some(Arc::new(callback));
    }

    /// Opens a session as `identity`.
    ///
    /// The outcome is reported through the status callback: CONNECTING
    /// first, then whatever the transport reports. Calling it while a session
    /// exists or is changing state only emits an error event.
    pub fn connect(&self, identity: &str, password: &str) {
        let inner = &self.inner;
        if let Err(rejected) = inner.session.begin_connect() {
            debug!(status = %rejected.status, "connect rejected");
            inner.notify_status(rejected);
            return;
        }
        inner.notify_status(StatusEvent::transition(ConnectionStatus::Connecting));

        let options = match inner.transport_options(identity, password) {
            Ok(options) => options,
            Err(event) => {
                warn!(%event, "cannot resolve connection settings");
                inner.session.set(ConnectionStatus::Disconnected);
                inner.notify_status(event);
                return;
            }
        };

        info!(identity = %options.identity, endpoint = %options.endpoint, "connecting");
        *inner
            .identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(options.identity.clone());

        let delegate = Arc::new(SessionDelegate {
            inner: Arc::downgrade(inner),
        });
        inner.transport.connect(delegate, options);
    }

    /// Closes the session.
    pub fn disconnect(&self) {
        let inner = &self.inner;
        if let Err(rejected) = inner.session.begin_disconnect() {
            debug!(status = %rejected.status, "disconnect rejected");
            inner.notify_status(rejected);
            return;
        }
        inner.notify_status(StatusEvent::transition(ConnectionStatus::Disconnecting));
        info!("disconnecting");
        inner.transport.disconnect();
    }

    /// Sends `envelope`.
    ///
    /// The client stamps the send date and the publisher. When the envelope
    /// has a timeout and `callback` is given, the envelope gets a fresh id
    /// and `callback` later receives either the reply or an `EXEC_TIMEOUT`
    /// result; the id is returned. Without a callback the timeout is cleared.
    pub fn send(
        &self,
        mut envelope: Envelope,
        callback: Option<ReplyCallback>,
    ) -> ClientResult<Option<String>> {
        let inner = &self.inner;
        if inner.session.status() != ConnectionStatus::Connected {
            return Err(ClientError::NotConnected);
        }
        if envelope.actor.trim().is_empty() {
            return Err(ClientError::MissingAttr("actor"));
        }

        envelope.sent = Some(Utc::now());
        envelope.publisher = inner
            .identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Identity::bare);

        let correlated = match (envelope.reply_timeout(), callback) {
            (Some(timeout), Some(callback)) => {
                let msgid = Uuid::new_v4().to_string();
                envelope.msgid = msgid.clone();
                inner.registry.register(msgid.clone(), timeout, callback);
                Some(msgid)
            }
            (Some(_), None) => {
                envelope.timeout = 0;
                None
            }
            (None, Some(_)) => {
                debug!(actor = %envelope.actor, "no timeout set, reply callback dropped");
                None
            }
            (None, None) => None,
        };

        debug!(
            actor = %envelope.actor,
            kind = envelope.kind.as_deref().unwrap_or(""),
            msgid = correlated.as_deref().unwrap_or(""),
            "sending envelope"
        );
        inner.transport.send_envelope(envelope);
        Ok(correlated)
    }

    /// Sends `envelope` and waits for its reply.
    ///
    /// Uses the configured request timeout when the envelope has none. A
    /// timeout is not an error: the returned envelope then carries an
    /// `EXEC_TIMEOUT` result.
    pub async fn request(&self, mut envelope: Envelope) -> ClientResult<Envelope> {
        if envelope.timeout == 0 {
            envelope.timeout = self.inner.options.request_timeout_ms();
        }

        let (tx, rx) = oneshot::channel();
        let callback: ReplyCallback = Box::new(move |reply| {
            let _ = tx.send(reply);
        });

        let msgid = self.send(envelope, Some(callback))?.unwrap_or_default();
        rx.await.map_err(|_| ClientError::Dropped { msgid })
    }

    /// Number of requests waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.inner.registry.len()
    }
}

impl Inner {
    fn callbacks(&self) -> std::sync::MutexGuard<'_, Callbacks> {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transport_options(
        &self,
        identity: &str,
        password: &str,
    ) -> Result<TransportOptions, StatusEvent> {
        let identity = Identity::parse(identity).map_err(|e| {
            StatusEvent::error(
                ConnectionStatus::Disconnected,
                ConnectionError::JidMalformat,
                e.to_string(),
            )
        })?;

        let endpoint = pick_endpoint(&self.options.endpoints, identity.domain()).map_err(|e| {
            StatusEvent::error(
                ConnectionStatus::Disconnected,
                ConnectionError::EndpointMalformat,
                e.to_string(),
            )
        })?;

        Ok(TransportOptions {
            identity,
            password: password.to_string(),
            endpoint,
            connect_timeout: self.options.connect_timeout,
        })
    }

    fn notify_status(&self, event: StatusEvent) {
        let Some(callback) = self.callbacks().status.clone() else {
            debug!(%event, "no status callback");
            return;
        };
        self.dispatcher.dispatch("status", move || callback(event));
    }

    fn handle_status(&self, status: ConnectionStatus, error: ConnectionError, message: Option<String>) {
        self.session.set(status);

        if status == ConnectionStatus::Disconnected {
            for (msgid, callback) in self.registry.drain() {
                debug!(msgid = %msgid, "failing pending request");
                let reply = Envelope::result_error(
                    msgid,
                    ResultStatus::NotConnected,
                    "connection closed before a reply arrived",
                );
                self.dispatcher.dispatch("reply", move || callback(reply));
            }
        }

        self.notify_status(StatusEvent::new(status, error, message));
    }

    fn handle_data(&self, kind: &str, data: Value) {
        if !kind.eq_ignore_ascii_case(DATA_TYPE_MESSAGE) {
            debug!(kind, "ignoring inbound data");
            return;
        }

        let envelope: Envelope = match serde_json::from_value(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping malformed inbound envelope");
                return;
            }
        };

        if let Some(key) = envelope.correlation_key()
            && let Some(callback) = self.registry.take(key)
        {
            debug!(msgid = key, "reply received");
            self.dispatcher.dispatch("reply", move || callback(envelope));
            return;
        }

        if envelope.is_result() {
            debug!(
                reference = envelope.reference.as_deref().unwrap_or(""),
                "dropping uncorrelated result"
            );
            return;
        }

        let callback = self.callbacks().message.clone();
        match callback {
            Some(callback) => self.dispatcher.dispatch("message", move || callback(envelope)),
            None => debug!(actor = %envelope.actor, "no message callback, dropping envelope"),
        }
    }
}

/// Delegate handed to the transport; holds the client weakly so a transport
/// outliving the client does not keep it alive.
struct SessionDelegate {
    inner: Weak<Inner>,
}

impl TransportDelegate for SessionDelegate {
    fn on_status(&self, status: ConnectionStatus, error: ConnectionError, message: Option<String>) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_status(status, error, message);
        }
    }

    fn on_data(&self, kind: &str, data: Value) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_data(kind, data);
        }
    }
}
