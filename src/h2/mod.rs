//! HTTP/2 framing for the upgrade handshake.
//!
//! The header stream carries nothing but HEADERS frames: one request from
//! the client, one response from the server. Only the 9-byte frame header
//! and the HEADERS payload layout are implemented here; the header block
//! itself is HPACK, handled by the `hpack` crate.

pub mod request;
pub mod response;
pub mod upgrade;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// Length of the fixed frame header.
pub const FRAME_HEADER_LEN: usize = 9;

/// HEADERS frame type.
pub const FRAME_TYPE_HEADERS: u8 = 0x1;

/// HEADERS frame flags.
pub const FLAG_END_STREAM: u8 = 0x01;
pub const FLAG_END_HEADERS: u8 = 0x04;
pub const FLAG_PADDED: u8 = 0x08;
pub const FLAG_PRIORITY: u8 = 0x20;

/// Largest frame payload accepted on the header stream. Matches the
/// HTTP/2 default SETTINGS_MAX_FRAME_SIZE.
pub const MAX_FRAME_PAYLOAD: usize = 16_384;

/// The fixed HTTP/2 frame header: length(24) + type(8) + flags(8) +
/// reserved bit + stream id(31).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub kind: u8,
    pub flags: u8,
    pub stream_id: u32,
}

impl FrameHeader {
    /// Encode the frame header into its wire format.
    pub fn encode(&self) -> [u8; FRAME_HEADER_LEN] {
        [
            ((self.length >> 16) & 0xff) as u8,
            ((self.length >> 8) & 0xff) as u8,
            (self.length & 0xff) as u8,
            self.kind,
            self.flags,
            ((self.stream_id >> 24) & 0x7f) as u8,
            ((self.stream_id >> 16) & 0xff) as u8,
            ((self.stream_id >> 8) & 0xff) as u8,
            (self.stream_id & 0xff) as u8,
        ]
    }

    /// Decode a frame header from its wire format.
    pub fn decode(bytes: &[u8; FRAME_HEADER_LEN]) -> Self {
        Self {
            length: u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]),
            kind: bytes[3],
            flags: bytes[4],
            stream_id: u32::from_be_bytes([bytes[5] & 0x7f, bytes[6], bytes[7], bytes[8]]),
        }
    }
}

/// Read one frame (header and payload) from the stream.
pub async fn read_frame<R>(rd: &mut R) -> Result<(FrameHeader, Vec<u8>)>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    rd.read_exact(&mut header).await?;
    let header = FrameHeader::decode(&header);

    if header.length as usize > MAX_FRAME_PAYLOAD {
        return Err(Error::protocol(format!(
            "frame payload of {} bytes exceeds the maximum",
            header.length
        )));
    }

    let mut payload = vec![0u8; header.length as usize];
    rd.read_exact(&mut payload).await?;
    Ok((header, payload))
}

/// Extract the header block fragment from a HEADERS payload, skipping the
/// pad length and priority fields announced by the flags.
pub fn headers_fragment<'a>(header: &FrameHeader, payload: &'a [u8]) -> Result<&'a [u8]> {
    let mut start = 0;
    let mut end = payload.len();

    if header.flags & FLAG_PADDED != 0 {
        if payload.is_empty() {
            return Err(Error::protocol("padded HEADERS frame without pad length"));
        }
        let pad = payload[0] as usize;
        start += 1;
        end = end
            .checked_sub(pad)
            .ok_or_else(|| Error::protocol("pad length exceeds frame payload"))?;
    }
    if header.flags & FLAG_PRIORITY != 0 {
        // 4 bytes stream dependency + 1 byte weight
        start += 5;
    }
    if start > end {
        return Err(Error::protocol("HEADERS frame payload too short"));
    }
    Ok(&payload[start..end])
}

/// Decoded header fields in block order, with case-insensitive lookup.
#[derive(Debug, Default, Clone)]
pub struct HeaderFields(Vec<(String, String)>);

impl HeaderFields {
    /// Append a field.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// First value for the given field name, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over all fields in block order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// HPACK-decode a header block fragment into field list form.
pub fn decode_fields(decoder: &mut hpack::Decoder<'_>, fragment: &[u8]) -> Result<HeaderFields> {
    let raw = decoder
        .decode(fragment)
        .map_err(|e| Error::protocol(format!("cannot decode header block: {e:?}")))?;

    let mut fields = HeaderFields::default();
    for (name, value) in raw {
        let name = String::from_utf8(name)
            .map_err(|_| Error::protocol("header name is not valid UTF-8"))?;
        let value = String::from_utf8(value)
            .map_err(|_| Error::protocol("header value is not valid UTF-8"))?;
        fields.push(name, value);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_header_roundtrip() {
        let header = FrameHeader {
            length: 0x0102_03,
            kind: FRAME_TYPE_HEADERS,
            flags: FLAG_END_HEADERS | FLAG_END_STREAM,
            stream_id: 4,
        };
        let decoded = FrameHeader::decode(&header.encode());
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_frame_header_masks_reserved_bit() {
        let mut bytes = FrameHeader {
            length: 0,
            kind: 0,
            flags: 0,
            stream_id: 1,
        }
        .encode();
        bytes[5] |= 0x80;
        assert_eq!(FrameHeader::decode(&bytes).stream_id, 1);
    }

    #[test]
    fn test_headers_fragment_plain() {
        let header = FrameHeader {
            length: 3,
            kind: FRAME_TYPE_HEADERS,
            flags: FLAG_END_HEADERS,
            stream_id: 1,
        };
        assert_eq!(headers_fragment(&header, &[1, 2, 3]).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_headers_fragment_strips_priority() {
        let header = FrameHeader {
            length: 7,
            kind: FRAME_TYPE_HEADERS,
            flags: FLAG_END_HEADERS | FLAG_PRIORITY,
            stream_id: 1,
        };
        let payload = [0, 0, 0, 0, 0xff, 0xAA, 0xBB];
        assert_eq!(headers_fragment(&header, &payload).unwrap(), &[0xAA, 0xBB]);
    }

    #[test]
    fn test_headers_fragment_strips_padding() {
        let header = FrameHeader {
            length: 6,
            kind: FRAME_TYPE_HEADERS,
            flags: FLAG_END_HEADERS | FLAG_PADDED,
            stream_id: 1,
        };
        let payload = [2, 0xAA, 0xBB, 0xCC, 0, 0];
        assert_eq!(
            headers_fragment(&header, &payload).unwrap(),
            &[0xAA, 0xBB, 0xCC]
        );
    }

    #[test]
    fn test_headers_fragment_rejects_oversized_padding() {
        let header = FrameHeader {
            length: 2,
            kind: FRAME_TYPE_HEADERS,
            flags: FLAG_PADDED,
            stream_id: 1,
        };
        assert!(headers_fragment(&header, &[9, 0]).is_err());
    }

    #[test]
    fn test_header_fields_lookup_is_case_insensitive() {
        let mut fields = HeaderFields::default();
        fields.push("Connection", "Upgrade");
        fields.push("upgrade", "QTP/0.1");

        assert_eq!(fields.get("connection"), Some("Upgrade"));
        assert_eq!(fields.get("UPGRADE"), Some("QTP/0.1"));
        assert_eq!(fields.get("qtp"), None);
    }

    #[test]
    fn test_decode_fields_roundtrip() {
        let mut encoder = hpack::Encoder::new();
        let block = encoder.encode(vec![
            (b":status".as_slice(), b"101".as_slice()),
            (b"connection".as_slice(), b"Upgrade".as_slice()),
        ]);

        let mut decoder = hpack::Decoder::new();
        let fields = decode_fields(&mut decoder, &block).unwrap();
        assert_eq!(fields.get(":status"), Some("101"));
        assert_eq!(fields.get("connection"), Some("Upgrade"));
    }
}
