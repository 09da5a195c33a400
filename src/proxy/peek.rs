//! Buffered reader with peek/discard semantics.
//!
//! SOCKS5 request parsing needs to look at a request without consuming it:
//! on the client the request bytes stay in the buffer and are relayed into
//! the tunnel stream verbatim, on the server they are discarded once the
//! outbound dial succeeded.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

const INITIAL_BUFFER_CAPACITY: usize = 512;

/// A buffered async reader exposing `peek` and `discard`.
///
/// Reading through the `AsyncRead` impl drains the peek buffer before
/// touching the underlying stream, so bytes that were peeked but not
/// discarded are delivered first.
pub struct PeekReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> PeekReader<R> {
    /// Wrap the given reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Return the first `n` bytes of the stream without consuming them,
    /// reading from the underlying stream as needed.
    ///
    /// Fails with `UnexpectedEof` if the stream ends before `n` bytes are
    /// available.
    pub async fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        while self.buf.len() < n {
            let read = self.inner.read_buf(&mut self.buf).await?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream closed while peeking",
                ));
            }
        }
        Ok(&self.buf[..n])
    }

    /// Drop the first `n` buffered bytes.
    pub fn discard(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.advance(n);
    }

    /// Number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for PeekReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        out: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let me = &mut *self;
        if !me.buf.is_empty() {
            let n = me.buf.len().min(out.remaining());
            out.put_slice(&me.buf[..n]);
            me.buf.advance(n);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut me.inner).poll_read(cx, out)
    }
}
