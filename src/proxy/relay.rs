//! One-direction byte relay.
//!
//! Each tunneled connection runs two relays on independent tasks, one per
//! direction. A relay never touches its source on completion: closing only
//! the destination propagates the half-close, and the peer ending the other
//! direction terminates the partner relay.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Copy bytes from `src` to `dst` until EOF or error, then shut `dst` down.
///
/// Routine EOF or peer-close is not an error here, so the result of the
/// copy is intentionally dropped.
pub async fn relay<R, W>(mut dst: W, mut src: R)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let _ = tokio::io::copy(&mut src, &mut dst).await;
    let _ = dst.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_relay_copies_and_half_closes() {
        let (mut src_tx, src_rx) = tokio::io::duplex(64);
        let (dst_tx, mut dst_rx) = tokio::io::duplex(64);

        let handle = tokio::spawn(relay(dst_tx, src_rx));

        src_tx.write_all(b"payload bytes").await.unwrap();
        drop(src_tx);

        let mut out = Vec::new();
        dst_rx.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"payload bytes");

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_relay_closes_destination_on_source_error() {
        let (src_tx, src_rx) = tokio::io::duplex(64);
        let (dst_tx, mut dst_rx) = tokio::io::duplex(64);

        let handle = tokio::spawn(relay(dst_tx, src_rx));
        drop(src_tx);

        // destination observes EOF, not a hang
        let mut out = Vec::new();
        dst_rx.read_to_end(&mut out).await.unwrap();
        assert!(out.is_empty());

        handle.await.unwrap();
    }
}
