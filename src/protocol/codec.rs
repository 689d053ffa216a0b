//! Protocol codec for encoding/decoding movements
//!
//! Handles serialization and framing of movement commands.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use super::{Movement, DEFAULT_MAX_MESSAGE_SIZE, MAGIC_BYTES};

/// Header size: magic(4) + length(4) = 8 bytes
pub const HEADER_SIZE: usize = 8;

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid magic bytes")]
    InvalidMagic,

    #[error("Message too large: {0} bytes (max: {1})")]
    MessageTooLarge(usize, usize),

    #[error("Malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encodes movements into the wire format
pub struct Encoder {
    max_message_size: usize,
}

impl Encoder {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_max_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    /// Encode a movement into a buffer
    pub fn encode(&self, movement: &Movement, buf: &mut BytesMut) -> Result<(), CodecError> {
        let payload = serde_json::to_vec(movement)?;

        if payload.len() > self.max_message_size {
            return Err(CodecError::MessageTooLarge(
                payload.len(),
                self.max_message_size,
            ));
        }

        buf.reserve(HEADER_SIZE + payload.len());
        buf.put_slice(&MAGIC_BYTES);
        buf.put_u32(payload.len() as u32);
        buf.put_slice(&payload);

        Ok(())
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes movements from the wire format
pub struct Decoder {
    state: DecodeState,
    max_message_size: usize,
}

#[derive(Default)]
enum DecodeState {
    #[default]
    Header,
    Payload {
        length: usize,
    },
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_max_size(max_message_size: usize) -> Self {
        Self {
            state: DecodeState::Header,
            max_message_size,
        }
    }

    /// Whether the decoder is partway through a frame
    pub fn is_mid_frame(&self, buf: &BytesMut) -> bool {
        matches!(self.state, DecodeState::Payload { .. }) || !buf.is_empty()
    }

    /// Attempt to decode a movement from the buffer
    /// Returns Ok(None) if more data is needed
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Movement>, CodecError> {
        loop {
            match self.state {
                DecodeState::Header => {
                    // Reject garbage as soon as the magic can be checked
                    let probe = buf.len().min(MAGIC_BYTES.len());
                    if buf[..probe] != MAGIC_BYTES[..probe] {
                        return Err(CodecError::InvalidMagic);
                    }

                    if buf.len() < HEADER_SIZE {
                        return Ok(None);
                    }

                    let length = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
                    if length > self.max_message_size {
                        return Err(CodecError::MessageTooLarge(length, self.max_message_size));
                    }

                    buf.advance(HEADER_SIZE);
                    self.state = DecodeState::Payload { length };
                }
                DecodeState::Payload { length } => {
                    if buf.len() < length {
                        return Ok(None);
                    }

                    let payload = buf.split_to(length);
                    self.state = DecodeState::Header;

                    let movement: Movement = serde_json::from_slice(&payload)?;
                    return Ok(Some(movement));
                }
            }
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ClientId;

    fn movement(direction: &str) -> Movement {
        Movement::new(ClientId::new("1234").unwrap(), direction)
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let encoder = Encoder::new();
        let mut decoder = Decoder::new();
        let mut buf = BytesMut::new();

        encoder.encode(&movement("d"), &mut buf).unwrap();

        let decoded = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, movement("D"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_multiple_messages() {
        let encoder = Encoder::new();
        let mut decoder = Decoder::new();
        let mut buf = BytesMut::new();

        for d in ["w", "a", "s"] {
            encoder.encode(&movement(d), &mut buf).unwrap();
        }

        for expected in ["W", "A", "S"] {
            let decoded = decoder.decode(&mut buf).unwrap().unwrap();
            assert_eq!(decoded.direction, expected);
        }
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_fragmented_frame() {
        let encoder = Encoder::new();
        let mut decoder = Decoder::new();
        let mut wire = BytesMut::new();
        encoder.encode(&movement("w"), &mut wire).unwrap();

        let mut buf = BytesMut::new();
        let last = wire.len() - 1;
        for (i, byte) in wire.iter().enumerate() {
            buf.put_u8(*byte);
            let result = decoder.decode(&mut buf).unwrap();
            if i < last {
                assert!(result.is_none());
            } else {
                assert_eq!(result.unwrap(), movement("W"));
            }
        }
    }

    #[test]
    fn test_invalid_magic() {
        let mut decoder = Decoder::new();
        let mut buf = BytesMut::from(&br#"{"client_id":"1234","direction":"W"}"#[..]);
        assert!(matches!(
            decoder.decode(&mut buf),
            Err(CodecError::InvalidMagic)
        ));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut decoder = Decoder::with_max_size(16);
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC_BYTES);
        buf.put_u32(17);
        assert!(matches!(
            decoder.decode(&mut buf),
            Err(CodecError::MessageTooLarge(17, 16))
        ));
    }

    #[test]
    fn test_malformed_json() {
        let mut decoder = Decoder::new();
        let payload = b"not json";
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC_BYTES);
        buf.put_u32(payload.len() as u32);
        buf.put_slice(payload);
        assert!(matches!(decoder.decode(&mut buf), Err(CodecError::Json(_))));
    }
}
