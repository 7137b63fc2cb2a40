//! Scripted transport for driving sessions without a socket

use async_trait::async_trait;
use bytes::Bytes;
use squery_core::Result;
use std::collections::VecDeque;
use std::time::Duration;

use crate::transport::Transport;

/// Replays canned datagrams, one batch per sent request
///
/// An empty batch means the server stays silent for that request. Requests
/// past the end of the script also go unanswered.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: VecDeque<Vec<Bytes>>,
    inbox: VecDeque<Bytes>,
    pub sent: Vec<Vec<u8>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next request with `datagrams`
    pub fn reply(mut self, datagrams: Vec<Bytes>) -> Self {
        self.replies.push_back(datagrams);
        self
    }

    /// Leave the next request unanswered
    pub fn timeout(self) -> Self {
        self.reply(Vec::new())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, datagram: &[u8]) -> Result<()> {
        self.sent.push(datagram.to_vec());
        self.inbox = self.replies.pop_front().unwrap_or_default().into();
        Ok(())
    }

    async fn recv(&mut self, _timeout: Duration) -> Result<Option<Bytes>> {
        Ok(self.inbox.pop_front())
    }
}

/// Wrap `body` in a single-packet header
pub fn single(body: &[u8]) -> Bytes {
    let mut datagram = vec![0xFF, 0xFF, 0xFF, 0xFF];
    datagram.extend_from_slice(body);
    Bytes::from(datagram)
}
