//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! Every message is a frame with a little-endian length prefix:
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Len (4)  │         Body (Len)          │
//! └──────────┴─────────────────────────────┘
//! ```
//!
//! ### Request Body
//! ```text
//! ┌──────────┬──────────┬────────┬──────────┬────────┬─────┐
//! │ argc (4) │ len1 (4) │  arg1  │ len2 (4) │  arg2  │ ... │
//! └──────────┴──────────┴────────┴──────────┴────────┴─────┘
//! ```
//!
//! ### Response Body
//! One tagged value, see [`super::response`].
//!
//! Decoding checks bounds before every read and never looks past the
//! declared end of a frame; bytes left over after a complete request or
//! response are an error.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use super::buffer::MessageBuffer;
use super::response::{ErrorCode, ReplyWriter, Response, Tag};
use crate::error::{Result, TideError};

/// Frame header size: 4 bytes body length
pub const HEADER_SIZE: usize = 4;

/// Maximum body size (32 MB)
pub const MAX_MESSAGE_SIZE: usize = 32 << 20;

/// Maximum number of strings in a request
pub const MAX_ARGS: usize = 200_000;

/// Arrays nested deeper than this are rejected when decoding
const MAX_NESTING: usize = 64;

// =============================================================================
// Framing
// =============================================================================

/// Body length of the complete frame at the front of `data`.
///
/// `Ok(None)` means more bytes are needed; an oversized length is an error
/// because the stream cannot be resynchronized.
pub fn frame_len(data: &[u8], max_message_size: usize) -> Result<Option<usize>> {
    if data.len() < HEADER_SIZE {
        return Ok(None);
    }
    let body_len = (&data[..HEADER_SIZE]).get_u32_le() as usize;
    if body_len > max_message_size {
        return Err(TideError::MessageTooLarge {
            size: body_len,
            max: max_message_size,
        });
    }
    if data.len() < HEADER_SIZE + body_len {
        return Ok(None);
    }
    Ok(Some(body_len))
}

// =============================================================================
// Requests
// =============================================================================

/// Encode a request frame
pub fn encode_request<S: AsRef<[u8]>>(args: &[S], max_message_size: usize) -> Result<BytesMut> {
    let body_len = 4 + args.iter().map(|a| 4 + a.as_ref().len()).sum::<usize>();
    if body_len > max_message_size {
        return Err(TideError::MessageTooLarge {
            size: body_len,
            max: max_message_size,
        });
    }

    let mut frame = BytesMut::with_capacity(HEADER_SIZE + body_len);
    frame.put_u32_le(body_len as u32);
    frame.put_u32_le(args.len() as u32);
    for arg in args {
        let arg = arg.as_ref();
        frame.put_u32_le(arg.len() as u32);
        frame.put_slice(arg);
    }
    Ok(frame)
}

/// Decode a request body into its argument strings
pub fn parse_request(body: &[u8], max_args: usize) -> Result<Vec<Vec<u8>>> {
    let mut cur = body;
    if cur.remaining() < 4 {
        return Err(TideError::Protocol("request: missing argument count".to_string()));
    }
    let argc = cur.get_u32_le() as usize;
    if argc > max_args {
        return Err(TideError::TooManyArgs {
            count: argc,
            max: max_args,
        });
    }

    // every argument needs at least its 4-byte length
    let mut args = Vec::with_capacity(argc.min(cur.remaining() / 4));
    for i in 0..argc {
        if cur.remaining() < 4 {
            return Err(TideError::Protocol(format!(
                "request: missing length of argument {}",
                i
            )));
        }
        let len = cur.get_u32_le() as usize;
        if cur.remaining() < len {
            return Err(TideError::Protocol(format!(
                "request: argument {} truncated (expected {}, got {})",
                i,
                len,
                cur.remaining()
            )));
        }
        args.push(cur[..len].to_vec());
        cur.advance(len);
    }

    if cur.has_remaining() {
        return Err(TideError::Protocol(format!(
            "request: {} trailing bytes",
            cur.remaining()
        )));
    }
    Ok(args)
}

// =============================================================================
// Responses
// =============================================================================

/// Reserve the length prefix of a response frame
pub fn begin_response(buf: &mut MessageBuffer) {
    buf.push_placeholder();
}

/// Backfill the length prefix of the current response frame. A body larger
/// than `max_message_size` is replaced by a `TOO_BIG` error.
pub fn end_response(buf: &mut MessageBuffer, max_message_size: usize) {
    let mut size = buf.placeholder_body_len();
    if size > max_message_size {
        buf.truncate_to_placeholder();
        ReplyWriter::new(buf).err(ErrorCode::TooBig, "response is too big");
        size = buf.placeholder_body_len();
    }
    buf.pop_placeholder(size as u32);
}

/// Append a complete response frame holding `value`
pub fn encode_response(buf: &mut MessageBuffer, value: &Response, max_message_size: usize) {
    begin_response(buf);
    ReplyWriter::new(buf).value(value);
    end_response(buf, max_message_size);
}

/// Decode a response body; the body must hold exactly one value
pub fn decode_response(body: &[u8]) -> Result<Response> {
    let mut cur = body;
    let value = decode_value(&mut cur, 0)?;
    if cur.has_remaining() {
        return Err(TideError::Protocol(format!(
            "response: {} trailing bytes",
            cur.remaining()
        )));
    }
    Ok(value)
}

fn need(cur: &[u8], n: usize, what: &str) -> Result<()> {
    if cur.remaining() < n {
        return Err(TideError::Protocol(format!(
            "response: truncated {} (expected {} bytes, got {})",
            what,
            n,
            cur.remaining()
        )));
    }
    Ok(())
}

fn decode_bytes(cur: &mut &[u8], what: &str) -> Result<Vec<u8>> {
    need(cur, 4, what)?;
    let len = cur.get_u32_le() as usize;
    need(cur, len, what)?;
    let data = cur[..len].to_vec();
    cur.advance(len);
    Ok(data)
}

fn decode_value(cur: &mut &[u8], depth: usize) -> Result<Response> {
    need(cur, 1, "tag")?;
    let tag = Tag::try_from(cur.get_u8())
        .map_err(|byte| TideError::Protocol(format!("response: unknown tag 0x{:02x}", byte)))?;

    match tag {
        Tag::Nil => Ok(Response::Nil),
        Tag::Err => {
            need(cur, 4, "error code")?;
            let code = cur.get_u32_le();
            let message = decode_bytes(cur, "error message")?;
            Ok(Response::Err {
                code,
                message: String::from_utf8_lossy(&message).into_owned(),
            })
        }
        Tag::Str => Ok(Response::Str(decode_bytes(cur, "string")?)),
        Tag::Int => {
            need(cur, 8, "int")?;
            Ok(Response::Int(cur.get_i64_le()))
        }
        Tag::Dbl => {
            need(cur, 8, "double")?;
            Ok(Response::Dbl(cur.get_f64_le()))
        }
        Tag::Arr => {
            if depth >= MAX_NESTING {
                return Err(TideError::Protocol("response: arrays nested too deep".to_string()));
            }
            need(cur, 4, "array length")?;
            let count = cur.get_u32_le() as usize;
            // every element needs at least its tag byte
            let mut items = Vec::with_capacity(count.min(cur.remaining()));
            for _ in 0..count {
                items.push(decode_value(cur, depth + 1)?);
            }
            Ok(Response::Arr(items))
        }
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Write a request frame to a stream
pub fn write_request<W: Write, S: AsRef<[u8]>>(
    writer: &mut W,
    args: &[S],
    max_message_size: usize,
) -> Result<()> {
    let frame = encode_request(args, max_message_size)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Read one complete response frame from a stream
///
/// Blocks until a complete frame is received or an error occurs
pub fn read_response<R: Read>(reader: &mut R, max_message_size: usize) -> Result<Response> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let body_len = (&header[..]).get_u32_le() as usize;
    if body_len > max_message_size {
        return Err(TideError::MessageTooLarge {
            size: body_len,
            max: max_message_size,
        });
    }

    let mut body = vec![0u8; body_len];
    reader.read_exact(&mut body)?;
    decode_response(&body)
}
