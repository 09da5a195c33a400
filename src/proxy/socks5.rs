//! SOCKS5 codec (RFC 1928 subset).
//!
//! Supports the "no authentication" method and the CONNECT command only.
//! Requests are peeked rather than read so the caller decides whether the
//! request bytes are discarded (server side) or relayed into the tunnel
//! stream as the in-stream request framing (client side).

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::proxy::peek::PeekReader;

/// Protocol version byte.
pub const SOCKS_VERSION: u8 = 5;

/// Commands.
pub const CMD_CONNECT: u8 = 1;
pub const CMD_BIND: u8 = 2;
pub const CMD_ASSOCIATE: u8 = 3;

/// Address types.
pub const ATYP_IPV4: u8 = 1;
pub const ATYP_DOMAIN: u8 = 3;
pub const ATYP_IPV6: u8 = 4;

/// Authentication methods.
pub const AUTH_NONE_REQUIRED: u8 = 0x00;
pub const AUTH_NO_ACCEPTABLE: u8 = 0xFF;

/// Reply status codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Succeeded = 0,
    GeneralFailure = 1,
    NotAllowed = 2,
    NetworkUnreachable = 3,
    HostUnreachable = 4,
    ConnectionRefused = 5,
    TtlExpired = 6,
    CmdNotSupported = 7,
    AtypNotSupported = 8,
}

/// Perform the greeting/method-selection exchange.
///
/// Accepts the connection iff the client advertises the "no authentication"
/// method; anything else is answered with `0xFF` and fails.
pub async fn auth<R, W>(rd: &mut PeekReader<R>, wr: &mut W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // 1 version, 1 nmethods, nmethods method bytes
    let header = rd.peek(2).await?;
    let version = header[0];
    let nmethods = header[1] as usize;

    if version != SOCKS_VERSION {
        return Err(Error::protocol(format!(
            "incompatible SOCKS version: {version}"
        )));
    }

    let greeting = rd.peek(2 + nmethods).await?;
    let acceptable = greeting[2..].contains(&AUTH_NONE_REQUIRED);
    rd.discard(2 + nmethods);

    if !acceptable {
        wr.write_all(&[SOCKS_VERSION, AUTH_NO_ACCEPTABLE]).await?;
        return Err(Error::protocol("no acceptable authentication method"));
    }
    wr.write_all(&[SOCKS_VERSION, AUTH_NONE_REQUIRED]).await?;
    Ok(())
}

/// A SOCKS5 request, borrowed from the peek reader's buffer.
///
/// The view stays in the reader: callers discard `encoded_len()` bytes once
/// the request has been consumed, or leave it buffered to relay it onward.
#[derive(Debug)]
pub struct Request<'a> {
    bytes: &'a [u8],
}

impl<'a> Request<'a> {
    /// The command byte (CONNECT, BIND or ASSOCIATE).
    pub fn cmd(&self) -> u8 {
        self.bytes[1]
    }

    /// The destination address.
    pub fn dest(&self) -> Addr<'a> {
        Addr {
            bytes: &self.bytes[3..],
        }
    }

    /// Total length of the request on the wire.
    pub fn encoded_len(&self) -> usize {
        self.bytes.len()
    }
}

/// Peek the request header without consuming it, inferring the total
/// length from the address type.
pub async fn peek_request<'a, R>(rd: &'a mut PeekReader<R>) -> Result<Request<'a>>
where
    R: AsyncRead + Unpin,
{
    // 1 version, 1 command, 1 reserved, 1 atyp
    const ADDR_START: usize = 4;

    let header = rd.peek(ADDR_START).await?;
    let version = header[0];
    if version != SOCKS_VERSION {
        return Err(Error::protocol(format!(
            "incompatible SOCKS version: {version}"
        )));
    }

    let atyp = header[3];
    let total = match atyp {
        ATYP_IPV4 => ADDR_START + 4 + 2,
        ATYP_DOMAIN => {
            let header = rd.peek(ADDR_START + 1).await?;
            let domain_len = header[4] as usize;
            ADDR_START + 1 + domain_len + 2
        }
        ATYP_IPV6 => ADDR_START + 16 + 2,
        _ => return Err(Error::protocol("address type is not supported")),
    };

    let bytes = rd.peek(total).await?;
    Ok(Request { bytes })
}

/// Destination address: an atyp byte, the address payload and a port.
pub struct Addr<'a> {
    bytes: &'a [u8],
}

impl<'a> Addr<'a> {
    /// The address type.
    pub fn atyp(&self) -> u8 {
        self.bytes[0]
    }

    /// The port of the address.
    pub fn port(&self) -> u16 {
        let i = self.bytes.len() - 2;
        u16::from_be_bytes([self.bytes[i], self.bytes[i + 1]])
    }

    /// Raw wire bytes of the address.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

impl fmt::Display for Addr<'_> {
    /// Formats the address as a `host:port` string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.bytes;
        match self.atyp() {
            ATYP_IPV4 => {
                let ip = Ipv4Addr::new(b[1], b[2], b[3], b[4]);
                write!(f, "{}:{}", ip, self.port())
            }
            ATYP_IPV6 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&b[1..17]);
                let ip = Ipv6Addr::from(octets);
                write!(f, "[{}]:{}", ip, self.port())
            }
            ATYP_DOMAIN => {
                let domain = String::from_utf8_lossy(&b[2..b.len() - 2]);
                write!(f, "{}:{}", domain, self.port())
            }
            _ => Ok(()),
        }
    }
}

/// Write a reply with the given status. When `addr` is absent, the zero
/// IPv4 address and zero port are used.
pub async fn send_reply<W>(wr: &mut W, status: ReplyStatus, addr: Option<&Addr<'_>>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    // 1 ver, 1 rep, 1 reserved, then atyp + address + port
    let mut reply = Vec::with_capacity(10);
    reply.push(SOCKS_VERSION);
    reply.push(status as u8);
    reply.push(0);
    match addr {
        Some(addr) => reply.extend_from_slice(addr.as_bytes()),
        None => {
            reply.push(ATYP_IPV4);
            reply.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        }
    }

    wr.write_all(&reply).await?;
    Ok(())
}
