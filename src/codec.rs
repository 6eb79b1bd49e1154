//! Binary codec for roster message serialization.
//!
//! The roster message shape is fixed by the game protocol, but its byte
//! encoding on any given transport is not. This module centralizes the
//! bincode configuration so every [`Transport`](crate::Transport)
//! implementation that wants a ready-made encoding produces identical,
//! deterministic bytes.
//!
//! # Examples
//!
//! ```
//! use roster_veil::codec::{decode, encode};
//!
//! let value: u32 = 42;
//! let bytes = encode(&value).expect("encoding should succeed");
//! let (decoded, _bytes_read): (u32, _) = decode(&bytes).expect("decoding should succeed");
//! assert_eq!(value, decoded);
//! ```

use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

// Fixed-int encoding keeps message sizes deterministic across platforms and
// avoids variable-length surprises for the latency field.
fn config() -> impl bincode::config::Config {
    bincode::config::standard().with_fixed_int_encoding()
}

/// Errors that can occur during encoding or decoding.
///
/// The underlying bincode errors are opaque and only expose human-readable
/// messages, so this type carries them as strings. Codec failures are
/// exceptional (corrupted data, protocol mismatch), never hot-path.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// The encoding operation failed.
    Encode {
        /// The underlying bincode error message.
        message: String,
    },
    /// The decoding operation failed.
    Decode {
        /// The underlying bincode error message.
        message: String,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode { message } => write!(f, "encoding failed: {message}"),
            Self::Decode { message } => write!(f, "decoding failed: {message}"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Encodes a value into a new `Vec<u8>`.
pub fn encode<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    bincode::serde::encode_to_vec(value, config()).map_err(|e| CodecError::Encode {
        message: e.to_string(),
    })
}

/// Decodes a value from a byte slice.
///
/// Returns the decoded value and the number of bytes consumed.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<(T, usize)> {
    bincode::serde::decode_from_slice(bytes, config()).map_err(|e| CodecError::Decode {
        message: e.to_string(),
    })
}

/// Decodes a value from a byte slice, ignoring the bytes consumed.
pub fn decode_value<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    decode(bytes).map(|(value, _)| value)
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::{GameMode, Participant, RosterAction, RosterEntry, RosterMessage};

    #[test]
    fn test_roundtrip_message() {
        let participant = Participant::new("alice", GameMode::Spectator, 88, "Alice");
        let msg = RosterMessage::single(
            RosterAction::Add,
            RosterEntry::from_participant(&participant, 88),
        );
        let bytes = encode(&msg).unwrap();
        let (decoded, read): (RosterMessage, _) = decode(&bytes).unwrap();
        assert_eq!(msg, decoded);
        assert_eq!(read, bytes.len());
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let participant = Participant::new("bob", GameMode::Standard, 12, "Bob");
        let msg = RosterMessage::single(
            RosterAction::Remove,
            RosterEntry::from_participant(&participant, 12),
        );
        assert_eq!(encode(&msg).unwrap(), encode(&msg).unwrap());
    }

    #[test]
    fn test_decode_invalid_data() {
        let garbage = [0xFF, 0xFF, 0xFF];
        let result: CodecResult<(RosterMessage, _)> = decode(&garbage);
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }

    #[test]
    fn test_error_display() {
        let err = CodecError::Decode {
            message: "unexpected end".to_owned(),
        };
        assert!(err.to_string().contains("decoding failed"));
        assert!(err.to_string().contains("unexpected end"));
    }
}
