//! Response definitions
//!
//! Responses are tagged values, encoded recursively:
//!
//! ```text
//!  nil      err                        str               int        dbl        arr
//! ┌─────┐  ┌─────┬──────┬─────┬─────┐  ┌─────┬─────┬───┐  ┌─────┬───┐ ┌─────┬───┐ ┌─────┬───────┬─────┐
//! │ tag │  │ tag │ code │ len │ msg │  │ tag │ len │ … │  │ tag │ 8 │ │ tag │ 8 │ │ tag │ count │ ... │
//! └─────┘  └─────┴──────┴─────┴─────┘  └─────┴─────┴───┘  └─────┴───┘ └─────┴───┘ └─────┴───────┴─────┘
//!   1B       1B    4B     4B                                                        1B     4B    values
//! ```

use std::fmt;

use super::buffer::MessageBuffer;

/// Value type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    Nil = 0,
    Err = 1,
    Str = 2,
    Int = 3,
    Dbl = 4,
    Arr = 5,
}

impl TryFrom<u8> for Tag {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(Tag::Nil),
            1 => Ok(Tag::Err),
            2 => Ok(Tag::Str),
            3 => Ok(Tag::Int),
            4 => Ok(Tag::Dbl),
            5 => Ok(Tag::Arr),
            other => Err(other),
        }
    }
}

/// Codes carried by `ERR` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    /// Unknown command or wrong number of arguments
    Unknown = 1,
    /// Response exceeded the maximum message size
    TooBig = 2,
    /// Key holds the wrong kind of value
    Type = 3,
    /// Argument could not be parsed
    Arg = 4,
}

impl ErrorCode {
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            1 => Some(ErrorCode::Unknown),
            2 => Some(ErrorCode::TooBig),
            3 => Some(ErrorCode::Type),
            4 => Some(ErrorCode::Arg),
            _ => None,
        }
    }
}

/// A decoded response value
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Nil,
    Err { code: u32, message: String },
    Str(Vec<u8>),
    Int(i64),
    Dbl(f64),
    Arr(Vec<Response>),
}

impl Response {
    /// Create an ERR value
    pub fn error(code: ErrorCode, message: &str) -> Self {
        Response::Err {
            code: code as u32,
            message: message.to_string(),
        }
    }

    pub fn str(data: impl AsRef<[u8]>) -> Self {
        Response::Str(data.as_ref().to_vec())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Err { .. })
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Nil => write!(f, "(nil)"),
            Response::Err { code, message } => write!(f, "(err) {} {}", code, message),
            Response::Str(data) => write!(f, "(str) {}", String::from_utf8_lossy(data)),
            Response::Int(v) => write!(f, "(int) {}", v),
            Response::Dbl(v) => write!(f, "(dbl) {}", v),
            Response::Arr(items) => {
                writeln!(f, "(arr) len={}", items.len())?;
                for item in items {
                    writeln!(f, "{}", item)?;
                }
                write!(f, "(arr) end")
            }
        }
    }
}

// =============================================================================
// Reply Writer
// =============================================================================

/// Serializes tagged values straight into an outgoing buffer
pub struct ReplyWriter<'a> {
    buf: &'a mut MessageBuffer,
}

impl<'a> ReplyWriter<'a> {
    pub fn new(buf: &'a mut MessageBuffer) -> Self {
        Self { buf }
    }

    pub fn nil(&mut self) {
        self.buf.put_u8(Tag::Nil as u8);
    }

    pub fn err(&mut self, code: ErrorCode, message: &str) {
        self.buf.put_u8(Tag::Err as u8);
        self.buf.put_u32(code as u32);
        self.buf.put_u32(message.len() as u32);
        self.buf.append(message.as_bytes());
    }

    pub fn str(&mut self, data: &[u8]) {
        self.buf.put_u8(Tag::Str as u8);
        self.buf.put_u32(data.len() as u32);
        self.buf.append(data);
    }

    pub fn int(&mut self, v: i64) {
        self.buf.put_u8(Tag::Int as u8);
        self.buf.put_i64(v);
    }

    pub fn dbl(&mut self, v: f64) {
        self.buf.put_u8(Tag::Dbl as u8);
        self.buf.put_f64(v);
    }

    /// Array header with a count known up front
    pub fn array(&mut self, count: u32) {
        self.buf.put_u8(Tag::Arr as u8);
        self.buf.put_u32(count);
    }

    /// Array header whose count is filled in by [`end_array`](Self::end_array)
    pub fn begin_array(&mut self) {
        self.buf.put_u8(Tag::Arr as u8);
        self.buf.push_placeholder();
    }

    pub fn end_array(&mut self, count: u32) {
        self.buf.pop_placeholder(count);
    }

    /// Encode a whole [`Response`] tree
    pub fn value(&mut self, value: &Response) {
        match value {
            Response::Nil => self.nil(),
            Response::Err { code, message } => {
                self.buf.put_u8(Tag::Err as u8);
                self.buf.put_u32(*code);
                self.buf.put_u32(message.len() as u32);
                self.buf.append(message.as_bytes());
            }
            Response::Str(data) => self.str(data),
            Response::Int(v) => self.int(*v),
            Response::Dbl(v) => self.dbl(*v),
            Response::Arr(items) => {
                self.array(items.len() as u32);
                for item in items {
                    self.value(item);
                }
            }
        }
    }
}
