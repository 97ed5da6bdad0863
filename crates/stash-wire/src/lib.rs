//! Wire format shared by the server, the interactive client and the tests.
//!
//! Both directions are length-prefixed: a `u32` little-endian byte count
//! followed by that many payload bytes. A request payload is an argument
//! vector (`argc`, then `argc` length-prefixed byte strings); a reply payload
//! is one tagged [`Reply`] value. All integers on the wire are little-endian,
//! all strings are raw bytes without terminators.

mod reply;
mod request;

pub use reply::{ErrCode, Reply};
pub use request::{encode_request, parse_request};
use thiserror::Error;

/// Size of the `u32` length prefix in front of every frame.
pub const HEADER_LEN: usize = size_of::<u32>();
/// Largest accepted frame payload, requests and replies alike.
pub const MAX_MSG: usize = 4096;
/// Largest accepted argument count in a request.
pub const MAX_ARGS: usize = 1024;

/// A malformed frame. Any of these tears the connection down; there are no
/// partial results.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame truncated")]
    Truncated,
    #[error("argument count {0} over limit")]
    TooManyArgs(u32),
    #[error("{0} trailing bytes after last element")]
    TrailingBytes(usize),
    #[error("payload of {0} bytes over limit")]
    Oversize(usize),
    #[error("unknown reply tag {0:#04x}")]
    UnknownTag(u8),
}

#[inline]
pub(crate) fn read_u32(buf: &[u8], at: usize) -> Result<u32, FrameError> {
    let bytes = buf
        .get(at..at + 4)
        .ok_or(FrameError::Truncated)?
        .try_into()
        .expect("slice is 4 bytes");
    Ok(u32::from_le_bytes(bytes))
}
