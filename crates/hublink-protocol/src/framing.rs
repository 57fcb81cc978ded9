//! Length-prefixed message framing.
//!
//! Every frame on a stream is a 4-byte big-endian length prefix followed by
//! the JSON body:
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  |  JSON payload    |
//! +----------------+------------------+
//! ```
//!
//! Transports reading from a socket take the prefix apart with
//! [`frame_len`] and hand the body to [`decode_payload`].

use serde::{Serialize, de::DeserializeOwned};

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Size of the length prefix.
pub const PREFIX_LEN: usize = 4;

/// Encodes a message to bytes with length prefix.
///
/// ```rust
/// use hublink_protocol::{encode_message, Frame};
///
/// let bytes = encode_message(&Frame::Logout).unwrap();
/// assert_eq!(&bytes[..4], &(bytes.len() as u32 - 4).to_be_bytes());
/// ```
pub fn encode_message<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    let len = json.len() as u32;

    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buffer = Vec::with_capacity(PREFIX_LEN + json.len());
    buffer.extend_from_slice(&len.to_be_bytes());
    buffer.extend_from_slice(&json);
    Ok(buffer)
}

/// Validates a length prefix and returns the body length it announces.
pub fn frame_len(prefix: [u8; PREFIX_LEN]) -> ProtocolResult<usize> {
    let len = u32::from_be_bytes(prefix);

    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    if len == 0 {
        return Err(ProtocolError::EmptyMessage);
    }

    Ok(len as usize)
}

/// Decodes a frame body (without prefix).
pub fn decode_payload<T: DeserializeOwned>(body: &[u8]) -> ProtocolResult<T> {
    Ok(serde_json::from_slice(body)?)
}

/// Decodes a complete framed message (length prefix + body).
pub fn decode_message<T: DeserializeOwned>(data: &[u8]) -> ProtocolResult<T> {
    let Some((prefix, rest)) = data.split_first_chunk::<PREFIX_LEN>() else {
        return Err(ProtocolError::IncompleteMessage {
            expected: PREFIX_LEN,
            received: data.len(),
        });
    };

    let len = frame_len(*prefix)?;
    if rest.len() < len {
        return Err(ProtocolError::IncompleteMessage {
            expected: PREFIX_LEN + len,
            received: data.len(),
        });
    }

    decode_payload(&rest[..len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Envelope, Frame};

    #[test]
    fn encode_writes_length_prefix() {
        let frame = Frame::login("alice@hub", "pw");
        let bytes = encode_message(&frame).unwrap();

        let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(len as usize, bytes.len() - PREFIX_LEN);

        let decoded: Frame = decode_message(&bytes).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn decode_incomplete_prefix() {
        let result: ProtocolResult<Frame> = decode_message(&[0, 0]);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage { expected: 4, .. })
        ));
    }

    #[test]
    fn decode_incomplete_body() {
        let mut data = vec![0, 0, 0, 100];
        data.extend_from_slice(&[0u8; 10]);

        let result: ProtocolResult<Frame> = decode_message(&data);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage { expected: 104, received: 14 })
        ));
    }

    #[test]
    fn frame_len_limits() {
        assert!(matches!(
            frame_len((MAX_MESSAGE_SIZE + 1).to_be_bytes()),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
        assert!(matches!(
            frame_len(0u32.to_be_bytes()),
            Err(ProtocolError::EmptyMessage)
        ));
        assert_eq!(frame_len(12u32.to_be_bytes()).unwrap(), 12);
    }

    #[test]
    fn encode_rejects_oversized_envelope() {
        let big = "x".repeat(MAX_MESSAGE_SIZE as usize);
        let envelope = Envelope::new("#bulk@hub", "blob", big.into());
        let frame = Frame::data(&envelope).unwrap();
        assert!(matches!(
            encode_message(&frame),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let mut bytes = encode_message(&Frame::Logout).unwrap();
        bytes.extend(encode_message(&Frame::login_accepted()).unwrap());
        let first: Frame = decode_message(&bytes).unwrap();
        assert_eq!(first, Frame::Logout);
    }
}
