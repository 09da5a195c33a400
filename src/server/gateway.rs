//! Minimal embedding web server for the upgrade handshake.
//!
//! A production deployment would embed the upgrade route into an existing
//! HTTP/2-over-QUIC server. This gateway implements just enough of one to
//! be self-contained: per QUIC connection it accepts the first
//! bidirectional stream as the header stream, reads the single HEADERS
//! frame, runs the route handler, writes the response HEADERS frame and,
//! for a 101 response, hands the connection to the handler registered for
//! the response's upgrade protocol.

use std::sync::Arc;
use std::time::Duration;

use quinn::{Connection, Endpoint, VarInt};
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::h2::upgrade::UpgradeRegistry;
use crate::h2::{
    decode_fields, headers_fragment, read_frame, HeaderFields, FrameHeader, FLAG_END_HEADERS,
    FLAG_END_STREAM, FRAME_TYPE_HEADERS,
};

/// How long a refused handshake waits for the client to take the response
/// before the connection is torn down.
const RESPONSE_LINGER: Duration = Duration::from_secs(5);

/// Response returned by a route handler.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: u16,
    fields: Vec<(String, String)>,
}

impl GatewayResponse {
    /// A response with the given status and no header fields.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            fields: Vec::new(),
        }
    }

    /// Add a header field.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// First value for the given header name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Route handler: decides how an upgrade request is answered.
pub type RouteHandler = dyn Fn(&HeaderFields) -> GatewayResponse + Send + Sync;

/// The upgrade gateway.
pub struct Gateway {
    registry: Arc<UpgradeRegistry>,
    handler: Arc<RouteHandler>,
}

impl Gateway {
    /// Create a gateway dispatching into the given registry, with the
    /// given route handler answering upgrade requests.
    pub fn new<F>(registry: UpgradeRegistry, handler: F) -> Self
    where
        F: Fn(&HeaderFields) -> GatewayResponse + Send + Sync + 'static,
    {
        Self {
            registry: Arc::new(registry),
            handler: Arc::new(handler),
        }
    }

    /// Accept QUIC connections on the endpoint until it is closed.
    pub async fn run(self, endpoint: Endpoint) -> Result<()> {
        tracing::info!(
            "listening for QUIC connections on {}",
            endpoint.local_addr()?
        );

        while let Some(incoming) = endpoint.accept().await {
            let registry = Arc::clone(&self.registry);
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                match incoming.await {
                    Ok(connection) => {
                        let peer = connection.remote_address();
                        if let Err(e) = handle_connection(registry, handler, connection).await {
                            tracing::debug!("upgrade handshake with {} failed: {}", peer, e);
                        }
                    }
                    Err(e) => tracing::debug!("incoming connection failed: {}", e),
                }
            });
        }
        Ok(())
    }
}

async fn handle_connection(
    registry: Arc<UpgradeRegistry>,
    handler: Arc<RouteHandler>,
    connection: Connection,
) -> Result<()> {
    let (mut send, mut recv) = connection.accept_bi().await?;

    let (frame, payload) = read_frame(&mut recv).await?;
    if frame.kind != FRAME_TYPE_HEADERS {
        return Err(Error::protocol("expected a HEADERS frame"));
    }
    if frame.flags & FLAG_END_HEADERS == 0 {
        return Err(Error::protocol("continuation frames are not supported"));
    }

    let fragment = headers_fragment(&frame, &payload)?;
    let mut decoder = hpack::Decoder::new();
    let request = decode_fields(&mut decoder, fragment)?;

    let response = handler(&request);
    tracing::debug!(
        "{} {} -> {}",
        request.get(":method").unwrap_or("-"),
        request.get(":path").unwrap_or("-"),
        response.status
    );

    write_response(&mut send, frame.stream_id, &response).await?;

    if response.status == 101 {
        let protocol = response.header("upgrade").unwrap_or_default().to_string();
        match registry.get(&protocol) {
            Some(upgrade) => {
                tracing::debug!("connection upgraded to {}", protocol);
                upgrade(connection.clone());
                // park the header stream halves until the session ends so
                // the peer never sees them reset
                let _ = connection.closed().await;
            }
            None => {
                let _ = send.finish();
                let _ = timeout(RESPONSE_LINGER, send.stopped()).await;
                connection.close(VarInt::from_u32(0), b"no known upgrade protocol");
            }
        }
    } else {
        // give the client a chance to read the refusal before closing
        let _ = send.finish();
        let _ = timeout(RESPONSE_LINGER, send.stopped()).await;
        connection.close(VarInt::from_u32(0), b"");
    }
    Ok(())
}

async fn write_response(
    send: &mut quinn::SendStream,
    stream_id: u32,
    response: &GatewayResponse,
) -> Result<()> {
    let status = response.status.to_string();
    let mut fields: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(response.fields.len() + 1);
    fields.push((b":status".to_vec(), status.into_bytes()));
    for (name, value) in &response.fields {
        fields.push((
            name.to_ascii_lowercase().into_bytes(),
            value.clone().into_bytes(),
        ));
    }

    let mut encoder = hpack::Encoder::new();
    let block = encoder.encode(fields.iter().map(|(n, v)| (n.as_slice(), v.as_slice())));

    let mut flags = FLAG_END_HEADERS;
    if response.status != 101 {
        flags |= FLAG_END_STREAM;
    }
    let header = FrameHeader {
        length: block.len() as u32,
        kind: FRAME_TYPE_HEADERS,
        flags,
        stream_id,
    };

    send.write_all(&header.encode()).await?;
    send.write_all(&block).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_response_builder() {
        let rsp = GatewayResponse::new(101)
            .with_header("Connection", "Upgrade")
            .with_header("Upgrade", "QTP/0.1");

        assert_eq!(rsp.status, 101);
        assert_eq!(rsp.header("connection"), Some("Upgrade"));
        assert_eq!(rsp.header("UPGRADE"), Some("QTP/0.1"));
        assert_eq!(rsp.header("qtp"), None);
    }
}
