use crossbeam_channel::{Receiver, Sender, TryRecvError};
use serde_json::{json, Value as JsonValue};
use tracing::warn;

use crate::error::CommandError;

/// Outcome of one method call, tagged with the caller's correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub correlation_id: Option<u64>,
    pub result: Result<JsonValue, CommandError>,
}

impl Reply {
    /// `{"id", "result"}` on success, `{"id", "error": {"code", "message"}}`
    /// on failure.
    pub fn to_json(&self) -> JsonValue {
        match &self.result {
            Ok(value) => json!({
                "id": self.correlation_id,
                "result": value,
            }),
            Err(err) => json!({
                "id": self.correlation_id,
                "error": {
                    "code": err.code(),
                    "message": err.to_string(),
                },
            }),
        }
    }
}

/// One-shot reply token for a single method call.
///
/// `resolve` consumes the token. A token dropped without being resolved
/// sends [`CommandError::ReplyDropped`], so every call yields exactly one
/// reply.
#[derive(Debug)]
pub struct Responder {
    correlation_id: Option<u64>,
    method: String,
    tx: Option<Sender<Reply>>,
}

impl Responder {
    pub fn new(correlation_id: Option<u64>, method: impl Into<String>, tx: Sender<Reply>) -> Self {
        Self {
            correlation_id,
            method: method.into(),
            tx: Some(tx),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn correlation_id(&self) -> Option<u64> {
        self.correlation_id
    }

    pub fn resolve(mut self, result: Result<JsonValue, CommandError>) {
        self.send(result);
    }

    pub fn success(self, value: JsonValue) {
        self.resolve(Ok(value));
    }

    pub fn error(self, err: CommandError) {
        self.resolve(Err(err));
    }

    fn send(&mut self, result: Result<JsonValue, CommandError>) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let reply = Reply {
            correlation_id: self.correlation_id,
            result,
        };
        if tx.send(reply).is_err() {
            warn!(
                target: "map_bridge::dispatch",
                method = %self.method,
                "reply.undeliverable=receiver_closed"
            );
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if self.tx.is_some() {
            warn!(
                target: "map_bridge::dispatch",
                method = %self.method,
                "reply.dropped=unresolved"
            );
            self.send(Err(CommandError::ReplyDropped));
        }
    }
}

/// Drains every reply currently queued without blocking.
pub fn collect_replies(rx: &Receiver<Reply>) -> Vec<Reply> {
    let mut replies = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(reply) => replies.push(reply),
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => break,
        }
    }
    replies
}
