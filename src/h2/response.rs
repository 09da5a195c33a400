//! Reads the upgrade response from the header stream.

use tokio::io::AsyncRead;

use crate::error::{Error, Result};
use crate::h2::{decode_fields, headers_fragment, read_frame, HeaderFields, FRAME_TYPE_HEADERS};

/// A decoded HTTP/2 response to the upgrade request.
#[derive(Debug, Clone)]
pub struct UpgradeResponse {
    pub status: u16,
    pub fields: HeaderFields,
}

impl UpgradeResponse {
    /// First value for the given header name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.fields.get(name)
    }
}

/// Read exactly one HEADERS frame from the header stream and decode it
/// into a response. Anything but a complete HEADERS frame with a valid
/// `:status` pseudo-header is a protocol error.
pub async fn read_response<R>(
    rd: &mut R,
    decoder: &mut hpack::Decoder<'_>,
) -> Result<UpgradeResponse>
where
    R: AsyncRead + Unpin,
{
    let (header, payload) = read_frame(rd).await?;

    if header.kind != FRAME_TYPE_HEADERS {
        return Err(Error::protocol("not a headers frame"));
    }
    if header.flags & crate::h2::FLAG_END_HEADERS == 0 {
        return Err(Error::protocol("continuation frames are not supported"));
    }

    let fragment = headers_fragment(&header, &payload)?;
    let fields = decode_fields(decoder, fragment)?;

    let status = fields
        .get(":status")
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| Error::protocol("response carries no valid :status"))?;

    Ok(UpgradeResponse { status, fields })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h2::{FrameHeader, FLAG_END_HEADERS};
    use tokio::io::AsyncWriteExt;

    async fn response_stream(fields: Vec<(&[u8], &[u8])>) -> tokio::io::DuplexStream {
        let mut encoder = hpack::Encoder::new();
        let block = encoder.encode(fields);
        let header = FrameHeader {
            length: block.len() as u32,
            kind: FRAME_TYPE_HEADERS,
            flags: FLAG_END_HEADERS,
            stream_id: 4,
        };

        let (mut tx, rx) = tokio::io::duplex(4096);
        tx.write_all(&header.encode()).await.unwrap();
        tx.write_all(&block).await.unwrap();
        rx
    }

    #[tokio::test]
    async fn test_read_response_decodes_status_and_fields() {
        let mut rx = response_stream(vec![
            (b":status".as_slice(), b"101".as_slice()),
            (b"connection".as_slice(), b"Upgrade".as_slice()),
            (b"upgrade".as_slice(), b"QTP/0.1".as_slice()),
        ])
        .await;

        let mut decoder = hpack::Decoder::new();
        let rsp = read_response(&mut rx, &mut decoder).await.unwrap();
        assert_eq!(rsp.status, 101);
        assert_eq!(rsp.header("Connection"), Some("Upgrade"));
        assert_eq!(rsp.header("upgrade"), Some("QTP/0.1"));
    }

    #[tokio::test]
    async fn test_read_response_rejects_non_headers_frame() {
        let header = FrameHeader {
            length: 0,
            kind: 0x0, // DATA
            flags: 0,
            stream_id: 4,
        };
        let (mut tx, mut rx) = tokio::io::duplex(64);
        tx.write_all(&header.encode()).await.unwrap();

        let mut decoder = hpack::Decoder::new();
        let err = read_response(&mut rx, &mut decoder).await.unwrap_err();
        assert!(err.to_string().contains("not a headers frame"));
    }

    #[tokio::test]
    async fn test_read_response_requires_status() {
        let mut rx =
            response_stream(vec![(b"connection".as_slice(), b"Upgrade".as_slice())]).await;

        let mut decoder = hpack::Decoder::new();
        assert!(read_response(&mut rx, &mut decoder).await.is_err());
    }
}
