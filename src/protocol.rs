//! The length-prefixed binary wire protocol.
//!
//! All integers on the wire are unsigned 32-bit little-endian.
//!
//! Request frame:
//!
//! ```text
//! +--------+---------+----------+----------+-----+----------+----------+
//! | len 4B | nargs 4B| arglen 4B| arg .... | ... | arglen 4B| arg .... |
//! +--------+---------+----------+----------+-----+----------+----------+
//!          |<------------------- len bytes ------------------->|
//! ```
//!
//! Response frame:
//!
//! ```text
//! +----------+-----------+-------------------+
//! | reslen 4B| status 4B | payload ......... |
//! +----------+-----------+-------------------+
//!            |<---------- reslen bytes ----->|
//! ```
//!
//! The parser consumes from a connection's incoming buffer and returns
//! `Ok(None)` when more data is required, so arbitrarily fragmented frames
//! are handled without copying them out of the buffer first.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// upper bound on the byte length of a frame body
pub const MAX_MSG: usize = 32 << 20;

/// upper bound on the number of argument strings in a request
pub const MAX_ARGS: usize = 200_000;

/// Response status codes carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Status {
    /// the request succeeded; the payload (if any) is the result
    Ok = 0,
    /// the request was not a recognized command
    Err = 1,
    /// the requested key does not exist
    Nx = 2,
}

impl Status {
    /// the numeric code sent on the wire
    pub fn code(self) -> u32 {
        self as u32
    }

    /// converts a wire code into a typed status
    pub fn from_code(code: u32) -> Option<Status> {
        match code {
            0 => Some(Status::Ok),
            1 => Some(Status::Err),
            2 => Some(Status::Nx),
            _ => None,
        }
    }
}

/// Frame errors detected while parsing a request stream.
///
/// Any of these is non-recoverable on a connection: the remaining bytes
/// cannot be re-synchronized to a frame boundary, so the connection must
/// be closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// the declared frame length exceeds [`MAX_MSG`]
    #[error("frame length {} exceeds the message size limit", .0)]
    Oversize(usize),

    /// the declared argument count exceeds [`MAX_ARGS`]
    #[error("argument count {} exceeds the argument limit", .0)]
    ArgCount(usize),

    /// an argument (or the argument count) runs past the end of the frame body
    #[error("argument data overruns the frame body")]
    Overrun,

    /// the arguments did not consume the frame body exactly
    #[error("trailing bytes after the last argument")]
    Trailing,
}

/// Attempts to parse a single request frame from the head of `buf`.
///
/// Returns `Ok(None)` if the buffer does not yet hold a complete frame.
/// On success the frame's bytes have been consumed from `buf`.
///
/// # Errors
/// Returns a [`FrameError`] if the frame violates a protocol limit or its
/// body is inconsistent with the declared lengths. An oversize frame is
/// rejected from the 4-byte header alone, before its body arrives.
pub fn parse_request(buf: &mut BytesMut) -> Result<Option<Vec<Vec<u8>>>, FrameError> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len > MAX_MSG {
        return Err(FrameError::Oversize(len));
    }
    if buf.len() < 4 + len {
        return Ok(None);
    }

    let mut body = buf.split_to(4 + len);
    body.advance(4);
    parse_args(body).map(Some)
}

/// decodes the argument vector from a complete frame body
fn parse_args(mut body: BytesMut) -> Result<Vec<Vec<u8>>, FrameError> {
    if body.remaining() < 4 {
        return Err(FrameError::Overrun);
    }
    let nargs = body.get_u32_le() as usize;
    if nargs > MAX_ARGS {
        return Err(FrameError::ArgCount(nargs));
    }

    // the capacity is not taken from the wire: a hostile frame could
    // declare MAX_ARGS and carry none of them
    let mut args = Vec::new();
    for _ in 0..nargs {
        if body.remaining() < 4 {
            return Err(FrameError::Overrun);
        }
        let arglen = body.get_u32_le() as usize;
        if body.remaining() < arglen {
            return Err(FrameError::Overrun);
        }
        args.push(body.split_to(arglen).to_vec());
    }
    if body.has_remaining() {
        return Err(FrameError::Trailing);
    }
    Ok(args)
}

/// Appends a request frame for `args` to `buf`.
pub fn write_request(buf: &mut BytesMut, args: &[&[u8]]) {
    let body = 4 + args.iter().map(|arg| 4 + arg.len()).sum::<usize>();
    buf.reserve(4 + body);
    buf.put_u32_le(body as u32);
    buf.put_u32_le(args.len() as u32);
    for arg in args {
        buf.put_u32_le(arg.len() as u32);
        buf.put_slice(arg);
    }
}

/// Appends a response frame to `buf`.
pub fn write_response(buf: &mut BytesMut, status: Status, payload: &[u8]) {
    buf.reserve(8 + payload.len());
    buf.put_u32_le((4 + payload.len()) as u32);
    buf.put_u32_le(status.code());
    buf.put_slice(payload);
}
