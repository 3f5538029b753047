//! Error types for the boundary protocol.

use std::fmt;
use std::io;

/// Errors reading or writing protocol messages.
#[derive(Debug)]
pub enum WireError {
    /// An I/O error on the underlying stream.
    Io(io::Error),
    /// The peer did not start with the `b"CHRL"` magic bytes.
    InvalidMagic {
        /// The four bytes that were read instead.
        found: [u8; 4],
    },
    /// The peer speaks a protocol version this build does not.
    UnsupportedVersion {
        /// The version announced by the peer.
        found: u8,
    },
    /// A message could not be decoded (truncated or corrupt data).
    MalformedMessage {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// A message or field tag is not recognized.
    UnknownTag {
        /// Which kind of tag was being decoded.
        what: &'static str,
        /// The unrecognized tag.
        tag: u8,
    },
    /// A length prefix exceeds [`MAX_MESSAGE_LEN`](crate::MAX_MESSAGE_LEN).
    MessageTooLarge {
        /// The announced length.
        len: u32,
    },
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InvalidMagic { found } => {
                write!(f, "invalid magic bytes {found:?} (expected b\"CHRL\")")
            }
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported protocol version {found}")
            }
            Self::MalformedMessage { detail } => write!(f, "malformed message: {detail}"),
            Self::UnknownTag { what, tag } => write!(f, "unknown {what} tag {tag}"),
            Self::MessageTooLarge { len } => write!(f, "message of {len} bytes exceeds limit"),
        }
    }
}

impl std::error::Error for WireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WireError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
