//! Length-Prefixed Framing
//!
//! Every message on the wire, in both directions, is a frame:
//!
//! ```text
//! ┌─────┬──────────────────────────────┐
//! │ LLL │ payload (LLL bytes)          │
//! └─────┴──────────────────────────────┘
//!   3 ASCII digits, zero padded, payload length only
//! ```
//!
//! `004Pa b` is a frame carrying the 4-byte payload `Pa b`.
//!
//! Like the rest of the protocol layer, decoding works on a caller-owned buffer
//! and returns either:
//! - `Ok(Some((payload, consumed)))` - a complete frame, `consumed` bytes were used
//! - `Ok(None)` - the frame is incomplete, read more data
//! - `Err(FrameError)` - the header is not a valid length

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size of the decimal length header.
pub const HEADER_LEN: usize = 3;

/// Largest payload a 3-digit header can describe.
pub const MAX_PAYLOAD_LEN: usize = 999;

/// Errors raised while encoding or decoding a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// A header byte is not an ASCII decimal digit
    #[error("invalid length header {0:?}")]
    InvalidLength(String),

    /// The payload does not fit in a single frame
    #[error("payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Parses the 3-byte length header.
fn parse_header(header: &[u8]) -> Result<usize, FrameError> {
    debug_assert_eq!(header.len(), HEADER_LEN);

    if !header.iter().all(u8::is_ascii_digit) {
        return Err(FrameError::InvalidLength(
            String::from_utf8_lossy(header).into_owned(),
        ));
    }

    Ok(header
        .iter()
        .fold(0usize, |acc, digit| acc * 10 + usize::from(digit - b'0')))
}

/// Attempts to decode one frame from the start of `buf`.
///
/// The header is validated as soon as its 3 bytes are available, so a bad
/// length is reported without waiting for a payload that will never come.
pub fn decode_frame(buf: &[u8]) -> Result<Option<(Bytes, usize)>, FrameError> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }

    let len = parse_header(&buf[..HEADER_LEN])?;
    let total = HEADER_LEN + len;

    if buf.len() < total {
        return Ok(None);
    }

    let payload = Bytes::copy_from_slice(&buf[HEADER_LEN..total]);
    Ok(Some((payload, total)))
}

/// Encodes `payload` into a complete frame.
///
/// Payloads longer than [`MAX_PAYLOAD_LEN`] are rejected, never truncated.
pub fn encode_frame(payload: &[u8]) -> Result<Bytes, FrameError> {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    encode_frame_into(payload, &mut buf)?;
    Ok(buf.freeze())
}

/// Appends the frame for `payload` to `dst`.
pub fn encode_frame_into(payload: &[u8], dst: &mut BytesMut) -> Result<(), FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    dst.reserve(HEADER_LEN + payload.len());
    dst.put_slice(format!("{:03}", payload.len()).as_bytes());
    dst.put_slice(payload);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame() {
        let frame = encode_frame(b"Pa b").unwrap();
        assert_eq!(&frame[..], b"004Pa b");
    }

    #[test]
    fn test_encode_empty_payload() {
        let frame = encode_frame(b"").unwrap();
        assert_eq!(&frame[..], b"000");
    }

    #[test]
    fn test_decode_frame() {
        let (payload, consumed) = decode_frame(b"002Ra").unwrap().unwrap();
        assert_eq!(payload, Bytes::from("Ra"));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_decode_incomplete_header() {
        assert!(decode_frame(b"00").unwrap().is_none());
        assert!(decode_frame(b"").unwrap().is_none());
    }

    #[test]
    fn test_decode_incomplete_payload() {
        assert!(decode_frame(b"010Rkey").unwrap().is_none());
    }

    #[test]
    fn test_decode_leaves_trailing_bytes() {
        let (payload, consumed) = decode_frame(b"002Ra002Gb").unwrap().unwrap();
        assert_eq!(payload, Bytes::from("Ra"));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_decode_rejects_non_digit_header() {
        assert_eq!(
            decode_frame(b"0x2Ra"),
            Err(FrameError::InvalidLength("0x2".to_string()))
        );
        assert!(matches!(
            decode_frame(b" 12"),
            Err(FrameError::InvalidLength(_))
        ));
        assert!(matches!(
            decode_frame(b"-01R"),
            Err(FrameError::InvalidLength(_))
        ));
    }

    #[test]
    fn test_roundtrip_every_length() {
        for len in 0..=MAX_PAYLOAD_LEN {
            let payload = vec![b'x'; len];
            let frame = encode_frame(&payload).unwrap();
            assert_eq!(frame.len(), HEADER_LEN + len);

            let (decoded, consumed) = decode_frame(&frame).unwrap().unwrap();
            assert_eq!(&decoded[..], &payload[..]);
            assert_eq!(consumed, frame.len());
        }
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = vec![b'x'; MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            encode_frame(&payload),
            Err(FrameError::PayloadTooLarge {
                size: 1000,
                max: MAX_PAYLOAD_LEN
            })
        );
    }

    #[test]
    fn test_encode_into_appends() {
        let mut buf = BytesMut::new();
        encode_frame_into(b"Ra", &mut buf).unwrap();
        encode_frame_into(b"Gb", &mut buf).unwrap();
        assert_eq!(&buf[..], b"002Ra002Gb");
    }

    #[test]
    fn test_binary_safe_payload() {
        let frame = encode_frame(b"Pk v\x00\xff").unwrap();
        let (payload, _) = decode_frame(&frame).unwrap().unwrap();
        assert_eq!(&payload[..], b"Pk v\x00\xff");
    }
}
