//! Request/response protocol spoken across the plugin isolation boundary.
//!
//! The host and a plugin module exchange length-prefixed binary messages
//! over a pair of byte streams (the module's stdin/stdout, or an in-process
//! pipe). Every request carries a sequence number that the matching
//! response echoes, so replies may arrive out of order when several
//! instances are driven concurrently.
//!
//! # Format
//!
//! ```text
//! module → host, once:   [MAGIC "CHRL"] [VERSION u8]
//! then, either way:      [len u32] [seq u64] [tag u8] [fields ...]
//! ```
//!
//! All integers are little-endian. Strings and byte arrays are prefixed
//! with a `u32` length. There is no compression and no schema.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{read_hello, read_request, read_response, write_hello, write_request, write_response};
pub use error::WireError;
pub use message::{Envelope, Rejection, Request, Response};

/// Magic bytes a module writes before any response.
pub const MAGIC: [u8; 4] = *b"CHRL";

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Upper bound on a single message body, in bytes.
///
/// Large enough for a 4096x4096 RGBA frame plus headers.
pub const MAX_MESSAGE_LEN: u32 = 80 * 1024 * 1024;
