//! Local proxy plumbing: SOCKS5 codec, peek reader, byte relay.

pub mod peek;
pub mod relay;
pub mod socks5;

pub use peek::PeekReader;
