//! Server session: QTP stream handling and replay protection.
//!
//! The upgrade handshake itself is answered by the embedding web server
//! (see [`gateway`]); once a session has been upgraded it is handed to
//! [`Server::upgrade`], which accepts QUIC streams and speaks QTP on each:
//! a SOCKS5 request block followed by raw payload bytes.

pub mod config;
pub mod gateway;

pub use config::ServerConfig;

use std::sync::Arc;
use std::time::Duration;

use quinn::{Connection, RecvStream, SendStream, VarInt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::cache::SequenceCache;
use crate::proxy::relay::relay;
use crate::proxy::socks5::{self, ReplyStatus, CMD_CONNECT};
use crate::proxy::PeekReader;
use crate::SEQUENCE_HEADER_LEN;

/// A quictun server handling upgraded QUIC sessions.
pub struct Server {
    dial_timeout: Duration,
    cache: SequenceCache,
}

impl Server {
    /// Create a server with the given outbound dial timeout and replay
    /// cache capacity.
    pub fn new(dial_timeout: Duration, cache_capacity: usize) -> Self {
        Self {
            dial_timeout,
            cache: SequenceCache::new(cache_capacity),
        }
    }

    /// Check and cache the sequence number sent by a client.
    ///
    /// The header value is 16 hex digits of client id followed by 8 hex
    /// digits of sequence number. Returns true iff the value parses and
    /// the sequence strictly exceeds any previously accepted sequence for
    /// that client id; parse failures leave the cache untouched.
    pub fn check_sequence_number(&self, header: &str) -> bool {
        if header.len() != SEQUENCE_HEADER_LEN || !header.bytes().all(|b| b.is_ascii_hexdigit()) {
            return false;
        }
        let Ok(client_id) = u64::from_str_radix(&header[..16], 16) else {
            return false;
        };
        let Ok(sequence) = u32::from_str_radix(&header[16..], 16) else {
            return false;
        };

        // the new sequence number must be larger than any previously seen
        self.cache.set(client_id, sequence) < sequence
    }

    /// Serve an upgraded QUIC session: accept streams until the session
    /// dies, speaking QTP on each.
    pub async fn upgrade(self: Arc<Self>, connection: Connection) {
        tracing::debug!("session upgraded, accepting streams");
        loop {
            match connection.accept_bi().await {
                Ok((send, recv)) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        server.handle_stream(send, recv).await;
                    });
                }
                Err(e) => {
                    tracing::debug!("accept stream: {}", e);
                    connection.close(VarInt::from_u32(0), e.to_string().as_bytes());
                    return;
                }
            }
        }
    }

    /// Handle one QTP stream: parse the leading SOCKS5 request, dial the
    /// destination and relay both directions.
    async fn handle_stream(&self, mut send: SendStream, recv: RecvStream) {
        let stream_id = recv.id();
        let mut rd = PeekReader::new(recv);

        let (cmd, dest, request_len) = match socks5::peek_request(&mut rd).await {
            Ok(req) => (req.cmd(), req.dest().to_string(), req.encoded_len()),
            Err(e) => {
                tracing::debug!("stream {}: {}", stream_id, e);
                let _ = send.reset(VarInt::from_u32(0));
                return;
            }
        };

        match cmd {
            CMD_CONNECT => {
                let remote = match timeout(self.dial_timeout, TcpStream::connect(dest.as_str())).await {
                    Ok(Ok(remote)) => remote,
                    Ok(Err(e)) => {
                        tracing::debug!("stream {}: dial {} failed: {}", stream_id, dest, e);
                        let _ = send.reset(VarInt::from_u32(0));
                        return;
                    }
                    Err(_) => {
                        tracing::debug!("stream {}: dial {} timed out", stream_id, dest);
                        let _ = send.reset(VarInt::from_u32(0));
                        return;
                    }
                };

                // the request header has been consumed; only payload bytes
                // flow to the destination
                rd.discard(request_len);
                tracing::debug!("stream {}: proxying to {}", stream_id, dest);

                let (remote_rd, remote_wr) = remote.into_split();
                let upload = tokio::spawn(relay(send, remote_rd));
                relay(remote_wr, rd).await;
                let _ = upload.await;
            }
            _ => {
                let _ = socks5::send_reply(&mut send, ReplyStatus::CmdNotSupported, None).await;
                let _ = send.reset(VarInt::from_u32(0));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> Server {
        Server::new(Duration::from_secs(5), 16)
    }

    #[test]
    fn test_sequence_accepted_when_strictly_increasing() {
        let server = server();
        assert!(server.check_sequence_number("00000000DEADBEEF00000001"));
        assert!(server.check_sequence_number("00000000DEADBEEF00000002"));
        assert!(server.check_sequence_number("00000000DEADBEEF0000000A"));
    }

    #[test]
    fn test_sequence_replay_rejected() {
        let server = server();
        assert!(server.check_sequence_number("00000000DEADBEEF00000005"));
        // equal and lower are replays
        assert!(!server.check_sequence_number("00000000DEADBEEF00000005"));
        assert!(!server.check_sequence_number("00000000DEADBEEF00000004"));
    }

    #[test]
    fn test_sequence_clients_are_independent() {
        let server = server();
        assert!(server.check_sequence_number("000000000000000100000003"));
        assert!(server.check_sequence_number("000000000000000200000001"));
    }

    #[test]
    fn test_sequence_rejects_bad_length() {
        let server = server();
        assert!(!server.check_sequence_number(""));
        assert!(!server.check_sequence_number("00000000DEADBEEF0000001"));
        assert!(!server.check_sequence_number("00000000DEADBEEF000000010"));
    }

    #[test]
    fn test_sequence_rejects_non_hex() {
        let server = server();
        assert!(!server.check_sequence_number("00000000DEADBEEF0000000G"));
        assert!(!server.check_sequence_number("+0000000DEADBEEF00000001"));
    }

    #[test]
    fn test_rejected_header_does_not_mutate_cache() {
        let server = server();
        // malformed header naming the same client id must not be cached
        assert!(!server.check_sequence_number("00000000DEADBEEF000000ZZ"));
        // so a first valid sequence of 1 is still accepted
        assert!(server.check_sequence_number("00000000DEADBEEF00000001"));
    }

    #[test]
    fn test_sequence_zero_is_never_fresh() {
        let server = server();
        // the cache's absent sentinel is 0, so sequence 0 can never be
        // strictly greater
        assert!(!server.check_sequence_number("00000000DEADBEEF00000000"));
    }
}
