//! # quictun
//!
//! A covert tunneling proxy: a local client accepts SOCKS5 connections and
//! forwards each connection's payload to a remote server over a single
//! multiplexed QUIC session. The server dials the final destination over
//! TCP and relays bytes in both directions.
//!
//! Until the protocol upgrade succeeds, the session is indistinguishable
//! from an ordinary HTTPS-over-QUIC request: the client sends one HTTP/2
//! request on a dedicated header stream and switches to the private QTP
//! framing only after the server has authenticated it and accepted a fresh
//! sequence number.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐  SOCKS5   ┌────────────┐   QUIC (TLS)   ┌────────────┐  TCP   ┌─────────────┐
//! │ application  ├──────────►│   client   ├───────────────►│  gateway/  ├───────►│ destination │
//! │ (local host) │           │  session   │  HTTP/2 → QTP  │   server   │        │    host     │
//! └──────────────┘           └────────────┘                └────────────┘        └─────────────┘
//! ```
//!
//! One QUIC session is shared by all local SOCKS connections; each
//! connection gets its own bidirectional QUIC stream carrying a SOCKS5
//! request block followed by raw payload bytes.

pub mod cache;
pub mod client;
pub mod error;
pub mod h2;
pub mod proxy;
pub mod server;
pub mod tls;

pub use error::{Error, Result};

/// Protocol identifier negotiated via the HTTP/2 upgrade.
pub const PROTOCOL_IDENTIFIER: &str = "QTP/0.1";

/// Length of the replay-protection header value: 16 hex digits of client id
/// followed by 8 hex digits of sequence number.
pub const SEQUENCE_HEADER_LEN: usize = 24;
