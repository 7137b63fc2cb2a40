//! # Request Builder
//!
//! Builds outbound query datagrams.
//!
//! ## Layout
//!
//! ```text
//! {FF FF FF FF}{command}[challenge]{payload}[challenge]
//! ```
//!
//! - Player and rules requests put the challenge right after the command.
//!   Without a known challenge they send `FF FF FF FF`, which asks the
//!   server to issue one.
//! - Info requests append the challenge after the probe payload, and only
//!   once the server has handed one out.
//! - The challenge byte order depends on the engine family.

use bytes::{BufMut, BytesMut};
use squery_core::ByteOrder;

use crate::packets::{Command, HEADER_SINGLE};

/// Challenge sent when none is known yet
pub const NO_CHALLENGE: u32 = 0xFFFF_FFFF;

/// Build a request datagram
///
/// # Arguments
/// * `command` - Request command
/// * `challenge` - Current session challenge, if any
/// * `payload` - Optional request payload (the info probe string)
/// * `byte_order` - Byte order of the challenge field
pub fn build_request(
    command: Command,
    challenge: Option<u32>,
    payload: Option<&[u8]>,
    byte_order: ByteOrder,
) -> BytesMut {
    let challenge_first = command.challenge_first();
    let challenge_last = command == Command::Info && challenge.is_some();

    let mut buf = BytesMut::with_capacity(
        5 + payload.map_or(0, |p| p.len()) + if challenge_first || challenge_last { 4 } else { 0 },
    );

    buf.put_i32_le(HEADER_SINGLE);
    buf.put_u8(command.as_u8());

    let value = challenge.unwrap_or(NO_CHALLENGE);

    if challenge_first {
        put_challenge(&mut buf, value, byte_order);
    }

    if let Some(payload) = payload {
        buf.put_slice(payload);
    }

    if challenge_last {
        put_challenge(&mut buf, value, byte_order);
    }

    buf
}

#[inline]
fn put_challenge(buf: &mut BytesMut, value: u32, byte_order: ByteOrder) {
    match byte_order {
        ByteOrder::Little => buf.put_u32_le(value),
        ByteOrder::Big => buf.put_u32(value),
    }
}
