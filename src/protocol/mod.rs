//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (length-prefixed binary, little-endian)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬──────────┬────────┬─────┐
//! │ Len (4)  │ argc (4) │ len (4)  │  arg   │ ... │
//! └──────────┴──────────┴──────────┴────────┴─────┘
//! ```
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────┐
//! │ Len (4)  │ Tag (1)  │   tag-specific payload  │
//! └──────────┴──────────┴─────────────────────────┘
//! ```
//!
//! ### Commands
//! - GET key / SET key value / DEL key / KEYS
//! - PEXPIRE key ms / PTTL key
//! - ZADD zkey score name / ZREM zkey name / ZSCORE zkey name
//! - ZQUERY zkey score name offset limit / ZRANK zkey name
//! - ZCOUNT zkey score1 name1 score2 name2

mod buffer;
mod codec;
mod command;
mod response;

pub use buffer::{MessageBuffer, DEFAULT_CAPACITY};
pub use codec::{
    begin_response, decode_response, encode_request, encode_response, end_response, frame_len,
    parse_request, read_response, write_request, HEADER_SIZE, MAX_ARGS, MAX_MESSAGE_SIZE,
};
pub use command::{Command, CommandError, CommandType};
pub use response::{ErrorCode, ReplyWriter, Response, Tag};
