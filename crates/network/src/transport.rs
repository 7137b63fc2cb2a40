//! # UDP Transport
//!
//! The only suspension point of a query: send one datagram, then wait for
//! datagrams from the server until a deadline.
//!
//! The session talks to a [`Transport`] so the protocol logic can be driven
//! by a scripted peer in tests. [`UdpTransport`] is the real implementation
//! over a connected Tokio socket, which only delivers datagrams coming from
//! the queried address.

use async_trait::async_trait;
use bytes::Bytes;
use squery_core::{QueryError, Result};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, trace};

/// Largest datagram we accept
const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// Datagram exchange with one server
#[async_trait]
pub trait Transport: Send {
    /// Send one datagram to the server
    async fn send(&mut self, datagram: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for the next datagram
    ///
    /// # Returns
    /// - `Ok(Some(datagram))` - A datagram arrived
    /// - `Ok(None)` - Nothing arrived in time
    async fn recv(&mut self, timeout: Duration) -> Result<Option<Bytes>>;
}

/// Tokio UDP socket connected to one server
pub struct UdpTransport {
    sock: UdpSocket,
    buf: Vec<u8>,
}

impl UdpTransport {
    /// Resolve `host` and pick the first address
    pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
        let mut addrs = tokio::net::lookup_host((host, port)).await?;
        addrs
            .next()
            .ok_or_else(|| QueryError::Config(format!("Could not resolve {}", host)))
    }

    /// Bind an ephemeral local port and connect it to `addr`
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let local: SocketAddr = match addr {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let sock = UdpSocket::bind(local).await?;
        sock.connect(addr).await?;
        debug!("UDP socket {} connected to {}", sock.local_addr()?, addr);

        Ok(Self {
            sock,
            buf: vec![0u8; RECV_BUFFER_SIZE],
        })
    }

    /// Address of the queried server
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.sock.peer_addr()?)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&mut self, datagram: &[u8]) -> Result<()> {
        trace!("UDP send {:02X?}", datagram);
        self.sock.send(datagram).await?;
        Ok(())
    }

    async fn recv(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        match tokio::time::timeout(timeout, self.sock.recv(&mut self.buf)).await {
            Ok(Ok(len)) => {
                trace!("UDP recv {:02X?}", &self.buf[..len]);
                Ok(Some(Bytes::copy_from_slice(&self.buf[..len])))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(None),
        }
    }
}
