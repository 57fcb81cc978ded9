//! Server command helpers.
//!
//! Each helper builds an `hCommand` envelope carrying the configured request
//! timeout and sends it with a reply callback. They return the id of the
//! correlated request.

use hublink_protocol::{Envelope, MessageOptions, build_command};
use serde_json::{Map, Value};

use crate::client::Client;
use crate::error::{ClientError, ClientResult};

/// Actor addressed by session-level commands.
pub const SESSION_ACTOR: &str = "session";

pub const CMD_SUBSCRIBE: &str = "hsubscribe";
pub const CMD_UNSUBSCRIBE: &str = "hunsubscribe";
pub const CMD_GET_LAST_MESSAGES: &str = "hgetlastmessages";
pub const CMD_GET_SUBSCRIPTIONS: &str = "hgetsubscriptions";
pub const CMD_GET_THREAD: &str = "hgetthread";
pub const CMD_GET_THREADS: &str = "hgetthreads";
pub const CMD_RELEVANT_MESSAGES: &str = "hRelevantMessages";

fn required(value: &str, attr: &'static str) -> ClientResult<()> {
    if value.trim().is_empty() {
        return Err(ClientError::MissingAttr(attr));
    }
    Ok(())
}

impl Client {
    fn command<F>(
        &self,
        actor: &str,
        cmd: &str,
        params: Option<Map<String, Value>>,
        callback: F,
    ) -> ClientResult<String>
    where
        F: FnOnce(Envelope) + Send + 'static,
    {
        let options = MessageOptions::new().timeout(self.options().request_timeout_ms());
        let envelope = build_command(actor, cmd, params, Some(options))?;
        self.send(envelope, Some(Box::new(callback)))?
            .ok_or_else(|| ClientError::config("command sent without a reply timeout"))
    }

    /// Subscribes to the channel `actor`.
    pub fn subscribe<F>(&self, actor: &str, callback: F) -> ClientResult<String>
    where
        F: FnOnce(Envelope) + Send + 'static,
    {
        self.command(actor, CMD_SUBSCRIBE, None, callback)
    }

    /// Unsubscribes from the channel `actor`.
    pub fn unsubscribe<F>(&self, actor: &str, callback: F) -> ClientResult<String>
    where
        F: FnOnce(Envelope) + Send + 'static,
    {
        self.command(actor, CMD_UNSUBSCRIBE, None, callback)
    }

    /// Fetches the last messages of `actor`; the server default applies
    /// when `count` is `None`.
    pub fn get_last_messages<F>(
        &self,
        actor: &str,
        count: Option<u32>,
        callback: F,
    ) -> ClientResult<String>
    where
        F: FnOnce(Envelope) + Send + 'static,
    {
        let params = count.map(|n| {
            let mut params = Map::new();
            params.insert("nbLastMsg".to_string(), Value::from(n));
            params
        });
        self.command(actor, CMD_GET_LAST_MESSAGES, params, callback)
    }

    /// Lists the channels the session is subscribed to.
    pub fn get_subscriptions<F>(&self, callback: F) -> ClientResult<String>
    where
        F: FnOnce(Envelope) + Send + 'static,
    {
        self.command(SESSION_ACTOR, CMD_GET_SUBSCRIPTIONS, None, callback)
    }

    /// Fetches the messages of conversation `convid` on `actor`.
    pub fn get_thread<F>(&self, actor: &str, convid: &str, callback: F) -> ClientResult<String>
    where
        F: FnOnce(Envelope) + Send + 'static,
    {
        required(actor, "actor")?;
        required(convid, "convid")?;
        let mut params = Map::new();
        params.insert("convid".to_string(), Value::from(convid));
        self.command(actor, CMD_GET_THREAD, Some(params), callback)
    }

    /// Lists the conversations of `actor` whose state is `status`.
    pub fn get_threads<F>(&self, actor: &str, status: &str, callback: F) -> ClientResult<String>
    where
        F: FnOnce(Envelope) + Send + 'static,
    {
        required(actor, "actor")?;
        required(status, "status")?;
        let mut params = Map::new();
        params.insert("status".to_string(), Value::from(status));
        self.command(actor, CMD_GET_THREADS, Some(params), callback)
    }

    /// Fetches the still-relevant messages of `actor`.
    pub fn get_relevant_messages<F>(&self, actor: &str, callback: F) -> ClientResult<String>
    where
        F: FnOnce(Envelope) + Send + 'static,
    {
        self.command(actor, CMD_RELEVANT_MESSAGES, None, callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use hublink_core::{ConnectionError, ConnectionStatus};
    use tokio::sync::mpsc;

    use crate::config::ClientOptions;
    use crate::transport::{Transport, TransportDelegate, TransportOptions};

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<Envelope>>,
    }

    impl Transport for Outbox {
        fn connect(&self, delegate: Arc<dyn TransportDelegate>, _options: TransportOptions) {
            delegate.on_status(ConnectionStatus::Connected, ConnectionError::NoError, None);
        }

        fn disconnect(&self) {}

        fn send_envelope(&self, envelope: Envelope) {
            self.sent.lock().unwrap().push(envelope);
        }
    }

    fn client() -> (Client, Arc<Outbox>) {
        let outbox = Arc::new(Outbox::default());
        let options = ClientOptions::default().with_request_timeout(Duration::from_millis(1500));
        let client = Client::with_transport(options, outbox.clone()).unwrap();
        client.connect("alice@hub/test", "pw");
        assert_eq!(client.status(), ConnectionStatus::Connected);
        (client, outbox)
    }

    fn last(outbox: &Outbox) -> Envelope {
        outbox.sent.lock().unwrap().last().cloned().unwrap()
    }

    #[tokio::test]
    async fn helpers_build_commands() {
        let (client, outbox) = client();

        let msgid = client.subscribe("#news@hub", |_| {}).unwrap();
        let sent = last(&outbox);
        assert_eq!(sent.msgid, msgid);
        assert_eq!(sent.actor, "#news@hub");
        assert_eq!(sent.timeout, 1500);
        assert_eq!(sent.command().unwrap().cmd, CMD_SUBSCRIBE);

        client.unsubscribe("#news@hub", |_| {}).unwrap();
        assert_eq!(last(&outbox).command().unwrap().cmd, CMD_UNSUBSCRIBE);

        client.get_subscriptions(|_| {}).unwrap();
        let sent = last(&outbox);
        assert_eq!(sent.actor, SESSION_ACTOR);
        assert_eq!(sent.command().unwrap().cmd, CMD_GET_SUBSCRIPTIONS);

        client.get_relevant_messages("#news@hub", |_| {}).unwrap();
        assert_eq!(last(&outbox).command().unwrap().cmd, "hRelevantMessages");

        assert_eq!(client.pending_requests(), 4);
    }

    #[tokio::test]
    async fn helper_parameters() {
        let (client, outbox) = client();

        client.get_last_messages("#news@hub", Some(5), |_| {}).unwrap();
        let params = last(&outbox).command().unwrap().params.unwrap();
        assert_eq!(params["nbLastMsg"], 5);

        client.get_last_messages("#news@hub", None, |_| {}).unwrap();
        assert!(last(&outbox).command().unwrap().params.is_none());

        client.get_thread("#support@hub", "conv-7", |_| {}).unwrap();
        let command = last(&outbox).command().unwrap();
        assert_eq!(command.cmd, CMD_GET_THREAD);
        assert_eq!(command.params.unwrap()["convid"], "conv-7");

        client.get_threads("#support@hub", "open", |_| {}).unwrap();
        let command = last(&outbox).command().unwrap();
        assert_eq!(command.cmd, CMD_GET_THREADS);
        assert_eq!(command.params.unwrap()["status"], "open");
    }

    #[tokio::test]
    async fn missing_arguments_fail_synchronously() {
        let (client, outbox) = client();

        assert!(matches!(
            client.subscribe("", |_| {}),
            Err(ClientError::MissingAttr("actor"))
        ));
        assert!(matches!(
            client.get_thread("#support@hub", " ", |_| {}),
            Err(ClientError::MissingAttr("convid"))
        ));
        assert!(matches!(
            client.get_threads("#support@hub", "", |_| {}),
            Err(ClientError::MissingAttr("status"))
        ));
        assert!(outbox.sent.lock().unwrap().is_empty());
        assert_eq!(client.pending_requests(), 0);
    }

    #[tokio::test]
    async fn helpers_require_a_session() {
        let outbox = Arc::new(Outbox::default());
        let client = Client::with_transport(ClientOptions::default(), outbox).unwrap();
        assert!(matches!(
            client.subscribe("#news@hub", |_| {}),
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn helper_callback_receives_timeout() {
        let (client, _outbox) = client();
        let (tx, mut rx) = mpsc::unbounded_channel();

        client
            .get_subscriptions(move |reply| {
                let _ = tx.send(reply);
            })
            .unwrap();

        tokio::time::advance(Duration::from_millis(1501)).await;
        let reply = rx.recv().await.unwrap();
        assert!(reply.result().unwrap().error_message().is_some());
    }
}
