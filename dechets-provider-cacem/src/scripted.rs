//! In-memory transport replaying canned responses.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::retry::{RawResponse, Transport, TransportError, TransportErrorKind};

type Reply = Result<RawResponse, TransportError>;

pub(crate) fn ok(body: &str) -> Reply {
    Ok(RawResponse {
        status: 200,
        body: body.to_owned(),
    })
}

pub(crate) fn status(code: u16) -> Reply {
    Ok(RawResponse {
        status: code,
        body: String::new(),
    })
}

pub(crate) fn transient(message: &str) -> Reply {
    Err(TransportError::new(TransportErrorKind::Connect, message))
}

/// Replies in order; per-URL scripts take precedence over the shared one.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    shared: Mutex<VecDeque<Reply>>,
    by_url: Mutex<HashMap<String, VecDeque<Reply>>>,
    log: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub(crate) fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            shared: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    pub(crate) fn route(self, url: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.by_url
            .lock()
            .expect("script lock")
            .insert(url.to_owned(), replies.into_iter().collect());
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.log.lock().expect("log lock").len()
    }

    pub(crate) fn requested(&self) -> Vec<String> {
        self.log.lock().expect("log lock").clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        self.log.lock().expect("log lock").push(url.to_owned());
        let routed = self
            .by_url
            .lock()
            .expect("script lock")
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        routed
            .or_else(|| self.shared.lock().expect("script lock").pop_front())
            .unwrap_or_else(|| status(404))
    }
}
