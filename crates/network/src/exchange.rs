//! # Request/Response Exchange
//!
//! Sends one request and waits for the matching response, reassembling
//! split responses on the way. Servers may answer any request with a fresh
//! challenge (`0x41`) instead of the data; the [`Exchanger`] stores the new
//! key and re-sends the request, up to [`CHALLENGE_RETRY_LIMIT`] times.

use bytes::Bytes;
use squery_core::{ByteOrder, QueryError, Result};
use squery_protocol::{
    build_request, classify, Command, Datagram, FragmentAssembler, PacketReader, ResponseCode,
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::QueryConfig;
use crate::state::SessionState;
use crate::transport::Transport;

/// Attempts per request before giving up on challenge renewals
pub const CHALLENGE_RETRY_LIMIT: usize = 3;

/// Outcome of waiting for one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    /// Complete response, starting at the response code
    Response(Bytes),
    /// No complete response before the socket timeout
    Timeout,
}

/// Drives request/response exchanges for one session
pub struct Exchanger<T: Transport> {
    transport: T,
    state: SessionState,
    assembler: FragmentAssembler,
    byte_order: ByteOrder,
    socket_timeout: Duration,
}

impl<T: Transport> Exchanger<T> {
    pub fn new(transport: T, config: &QueryConfig) -> Self {
        Self {
            transport,
            state: SessionState::from_config(config),
            assembler: FragmentAssembler::new(config.fragment_ttl),
            byte_order: config.byte_order,
            socket_timeout: config.socket_timeout,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `command` and return the body of the response
    ///
    /// # Arguments
    /// * `command` - Request command
    /// * `payload` - Optional request payload
    /// * `expect` - Response code the caller is waiting for
    /// * `allow_timeout` - Whether a missing response is acceptable
    ///
    /// # Returns
    /// - `Ok(Some(body))` - Bytes following the response code
    /// - `Ok(None)` - Timed out and `allow_timeout` was set
    ///
    /// # Errors
    /// - `QueryError::Timeout` - Timed out and `allow_timeout` was not set
    /// - `QueryError::ChallengeRetryExceeded` - Every attempt only renewed the challenge
    pub async fn send_packet(
        &mut self,
        command: Command,
        payload: Option<&[u8]>,
        expect: ResponseCode,
        allow_timeout: bool,
    ) -> Result<Option<Bytes>> {
        for attempt in 1..=CHALLENGE_RETRY_LIMIT {
            let response = match self.send_packet_raw(command, payload).await? {
                Exchange::Response(response) => response,
                Exchange::Timeout if allow_timeout => {
                    debug!("No reply to {:?}, continuing without it", command);
                    return Ok(None);
                }
                Exchange::Timeout => return Err(QueryError::Timeout),
            };

            let mut reader = PacketReader::new(response.clone());
            let code = reader.read_u8()?;

            let mut renewed = false;
            if code == ResponseCode::Challenge.as_u8() {
                let key = reader.read_u32()?;
                if self.state.challenge != Some(key) {
                    debug!("Received new challenge key: 0x{:08x}", key);
                    self.state.challenge = Some(key);
                    renewed = true;
                }
            }

            if code == expect.as_u8() {
                return Ok(Some(response.slice(1..)));
            }

            if renewed {
                debug!(
                    "Challenge renewed on attempt {}/{}, re-sending {:?}",
                    attempt, CHALLENGE_RETRY_LIMIT, command
                );
                continue;
            }

            debug!(
                "Unexpected response code 0x{:02x} to {:?} (wanted 0x{:02x})",
                code,
                command,
                expect.as_u8()
            );
            return Ok(Some(response.slice(1..)));
        }

        Err(QueryError::ChallengeRetryExceeded { attempts: CHALLENGE_RETRY_LIMIT })
    }

    /// Send one request and wait for a complete response
    ///
    /// Split responses are collected until their transaction completes.
    /// Fragments left over from earlier requests are discarded. Datagrams
    /// with an unknown header are logged and skipped.
    pub async fn send_packet_raw(
        &mut self,
        command: Command,
        payload: Option<&[u8]>,
    ) -> Result<Exchange> {
        let request = build_request(command, self.state.challenge, payload, self.byte_order);
        self.assembler.clear();
        trace!("Sending {:?}: {:02X?}", command, &request[..]);
        self.transport.send(&request).await?;

        let deadline = Instant::now() + self.socket_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Exchange::Timeout);
            }

            let Some(datagram) = self.transport.recv(remaining).await? else {
                return Ok(Exchange::Timeout);
            };

            match classify(datagram) {
                Ok(Datagram::Single(body)) => return Ok(Exchange::Response(body)),
                Ok(Datagram::Fragment(body)) => {
                    if let Some(payload) = self.assembler.push(body, self.state.split_format())? {
                        return Ok(Exchange::Response(payload));
                    }
                }
                Err(e) => warn!("Ignoring datagram: {}", e),
            }
        }
    }
}
