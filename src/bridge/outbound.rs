use super::channel::ChannelHandle;
use super::errors::BridgeError;
use super::route::Route;
use super::types::{Envelope, LogLevel, LOG_OP};
use futures::future::BoxFuture;
use serde_json::{json, Value};

/// Callback receiving the decoded backend reply
pub type ResponseHandler = Box<dyn FnOnce(Value) + Send + 'static>;

/// Sending half of the bridge
///
/// Cheap to clone. Plugins and op handlers hold one to talk to the backend
/// without borrowing the [`Bridge`](super::Bridge) itself.
#[derive(Clone)]
pub struct Outbound {
    channel: ChannelHandle,
}

impl Outbound {
    pub(crate) fn new(channel: ChannelHandle) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &ChannelHandle {
        &self.channel
    }

    /// Send `{op, op_data: payload}` to the backend.
    ///
    /// Fire-and-continue: the call is queued immediately. When `on_response`
    /// is given, the reply is parsed as JSON and passed to it; a reply that
    /// does not parse is reported at ERROR level and otherwise dropped. No
    /// timeout is applied, so an unanswered call leaves the handler pending.
    pub fn send_to_backend(&self, op: &str, payload: Value, on_response: Option<ResponseHandler>) {
        let message = match Envelope::new(op, payload).to_wire() {
            Ok(message) => message,
            Err(error) => {
                tracing::error!(op = %op, error = %error, "Failed to serialize envelope");
                return;
            }
        };

        let pending = self.channel.invoke(message);
        let Some(handler) = on_response else {
            return;
        };

        let outbound = self.clone();
        let op = op.to_string();
        tokio::spawn(async move {
            match pending.await {
                Ok(reply) => match serde_json::from_str::<Value>(&reply) {
                    Ok(value) => handler(value),
                    Err(error) => outbound.error(&format!(
                        "send_to_backend(\"{}\") returned with error: \"{}\"",
                        op, error
                    )),
                },
                Err(error) => {
                    tracing::warn!(op = %op, error = %error, "No reply from backend");
                }
            }
        });
    }

    /// Send an op and await the decoded reply.
    ///
    /// The call is queued before this returns, like [`send_to_backend`](Self::send_to_backend).
    pub fn request(&self, op: &str, payload: Value) -> BoxFuture<'static, Result<Value, BridgeError>> {
        let pending = Envelope::new(op, payload)
            .to_wire()
            .map(|message| self.channel.invoke(message));

        Box::pin(async move {
            let reply = pending?.await?;
            Ok(serde_json::from_str(&reply)?)
        })
    }

    /// Send a plugin-scoped op: `Plugin|<plugin>|<op>`
    pub fn plugin_send(&self, plugin: &str, op: &str, payload: Value) {
        match Route::plugin(plugin, op) {
            Ok(route) => self.send_to_backend(&route.to_string(), payload, None),
            Err(error) => self.error(&format!(
                "Plugin \"{}\" cannot send op \"{}\": {}",
                plugin, op, error
            )),
        }
    }

    /// Log through the backend side-channel, mirrored to the local subscriber.
    ///
    /// The side-channel carries DEBUG, INFO, WARNING and ERROR; CRITICAL is
    /// sent as ERROR.
    pub fn log(&self, level: LogLevel, message: &str) {
        let level = match level {
            LogLevel::Critical => LogLevel::Error,
            level => level,
        };
        match level {
            LogLevel::Debug => tracing::debug!(target: "webchannel::client", "{}", message),
            LogLevel::Info => tracing::info!(target: "webchannel::client", "{}", message),
            LogLevel::Warning => tracing::warn!(target: "webchannel::client", "{}", message),
            LogLevel::Error | LogLevel::Critical => {
                tracing::error!(target: "webchannel::client", "{}", message)
            }
        }

        self.send_to_backend(
            LOG_OP,
            json!({ "message": message, "log_level": level }),
            None,
        );
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    pub fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::channel::{Connection, PendingReply};
    use crate::bridge::testing::RecordingConnection;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Never answers the first call; answers later calls when released
    #[derive(Clone, Default)]
    struct StalledConnection {
        ops: Arc<Mutex<Vec<String>>>,
        releases: Arc<Mutex<Vec<oneshot::Sender<String>>>>,
    }

    impl StalledConnection {
        fn ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }

        fn release_latest(&self, reply: &str) {
            let sender = self.releases.lock().unwrap().pop().unwrap();
            sender.send(reply.to_string()).unwrap();
        }
    }

    impl Connection for StalledConnection {
        fn invoke(&self, message: String) -> PendingReply {
            let envelope = Envelope::from_wire(&message).unwrap();
            let mut ops = self.ops.lock().unwrap();
            ops.push(envelope.op);
            if ops.len() == 1 {
                return Box::pin(futures::future::pending());
            }

            let (tx, rx) = oneshot::channel();
            self.releases.lock().unwrap().push(tx);
            Box::pin(async move { rx.await.map_err(|_| BridgeError::ChannelClosed) })
        }
    }

    fn resolved(connection: &RecordingConnection) -> Outbound {
        let (channel, resolver) = ChannelHandle::new().unwrap();
        resolver.resolve(connection.clone());
        Outbound::new(channel)
    }

    #[tokio::test]
    async fn test_log_uses_side_channel() {
        let connection = RecordingConnection::new();
        let outbound = resolved(&connection);

        outbound.warning("disk almost full");
        outbound.channel().flush().await;

        let envelopes = connection.envelopes();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].op, "print_from_js");
        assert_eq!(
            envelopes[0].op_data,
            json!({"message": "disk almost full", "log_level": "WARNING"})
        );
    }

    #[tokio::test]
    async fn test_response_handler_receives_decoded_reply() {
        let connection = RecordingConnection::with_reply(r#"{"ret_status":"OK","count":3}"#);
        let outbound = resolved(&connection);
        let (tx, rx) = oneshot::channel();

        outbound.send_to_backend(
            "count_items",
            json!({}),
            Some(Box::new(move |value| {
                let _ = tx.send(value);
            })),
        );

        let value = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("handler was not called")
            .unwrap();
        assert_eq!(value["count"], 3);
    }

    #[tokio::test]
    async fn test_unparsable_reply_is_logged_not_raised() {
        let connection = RecordingConnection::with_reply("this is not json");
        let outbound = resolved(&connection);
        let (tx, mut rx) = oneshot::channel::<Value>();

        outbound.send_to_backend(
            "count_items",
            json!({}),
            Some(Box::new(move |value| {
                let _ = tx.send(value);
            })),
        );

        let mut errors = Vec::new();
        for _ in 0..200 {
            outbound.channel().flush().await;
            errors = connection.logs(LogLevel::Error);
            if !errors.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("count_items"));
        // Handler was dropped without being called
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unanswered_call_does_not_block_later_calls() {
        let connection = StalledConnection::default();
        let (channel, resolver) = ChannelHandle::new().unwrap();
        resolver.resolve(connection.clone());
        let outbound = Outbound::new(channel);

        let (first_tx, mut first_rx) = oneshot::channel::<Value>();
        let (second_tx, second_rx) = oneshot::channel::<Value>();
        outbound.send_to_backend(
            "first",
            json!({"n": 1}),
            Some(Box::new(move |value| {
                let _ = first_tx.send(value);
            })),
        );
        outbound.send_to_backend(
            "second",
            json!({"n": 2}),
            Some(Box::new(move |value| {
                let _ = second_tx.send(value);
            })),
        );

        outbound.channel().flush().await;
        assert_eq!(connection.ops(), vec!["first", "second"]);

        connection.release_latest(r#"{"n":2}"#);
        let second = tokio::time::timeout(Duration::from_secs(2), second_rx)
            .await
            .expect("second handler was not called")
            .unwrap();
        assert_eq!(second, json!({"n": 2}));

        // The first reply never arrives, so its handler stays pending
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(
            first_rx.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_critical_is_sent_as_error() {
        let connection = RecordingConnection::new();
        let outbound = resolved(&connection);

        outbound.log(LogLevel::Critical, "out of memory");
        outbound.channel().flush().await;

        assert_eq!(connection.logs(LogLevel::Error), vec!["out of memory"]);
        assert!(connection.logs(LogLevel::Critical).is_empty());
    }

    #[tokio::test]
    async fn test_request_returns_reply() {
        let connection = RecordingConnection::with_reply(r#"{"ret_status":"OK"}"#);
        let outbound = resolved(&connection);

        let reply = outbound.request("ping", json!({"n": 1})).await.unwrap();
        assert_eq!(reply, json!({"ret_status": "OK"}));
        assert_eq!(connection.envelopes()[0], Envelope::new("ping", json!({"n": 1})));
    }

    #[tokio::test]
    async fn test_plugin_send_scopes_op() {
        let connection = RecordingConnection::new();
        let outbound = resolved(&connection);

        outbound.plugin_send("Roundtrip", "roundtrip_from_js", json!({"alert_msg": "hi"}));
        outbound.channel().flush().await;

        assert_eq!(connection.envelopes()[0].op, "Plugin|Roundtrip|roundtrip_from_js");
    }
}
