//! Codec Tests
//!
//! Tests for request and response framing, including truncated and
//! malformed input.

use std::io::Cursor;

use tidekv::protocol::{
    begin_response, decode_response, encode_request, encode_response, end_response, frame_len,
    parse_request, read_response, write_request, ErrorCode, MessageBuffer, ReplyWriter, Response,
    Tag, HEADER_SIZE, MAX_ARGS, MAX_MESSAGE_SIZE,
};
use tidekv::TideError;

// =============================================================================
// Helper Functions
// =============================================================================

/// Body of an encoded request
fn request_body(args: &[&[u8]]) -> Vec<u8> {
    let frame = encode_request(args, MAX_MESSAGE_SIZE).unwrap();
    frame[HEADER_SIZE..].to_vec()
}

/// Encode `value` as a frame and decode it back through the frame helpers
fn frame_round_trip(value: &Response) -> Response {
    let mut buf = MessageBuffer::new();
    encode_response(&mut buf, value, MAX_MESSAGE_SIZE);
    let len = frame_len(buf.readable(), MAX_MESSAGE_SIZE).unwrap().unwrap();
    assert_eq!(buf.len(), HEADER_SIZE + len);
    decode_response(&buf.readable()[HEADER_SIZE..]).unwrap()
}

// =============================================================================
// Request Tests
// =============================================================================

#[test]
fn test_request_layout() {
    let frame = encode_request(&["set", "k", "v"], MAX_MESSAGE_SIZE).unwrap();

    let mut expected = Vec::new();
    expected.extend_from_slice(&21u32.to_le_bytes());
    expected.extend_from_slice(&3u32.to_le_bytes());
    for arg in [&b"set"[..], b"k", b"v"] {
        expected.extend_from_slice(&(arg.len() as u32).to_le_bytes());
        expected.extend_from_slice(arg);
    }
    assert_eq!(&frame[..], expected.as_slice());
}

#[test]
fn test_parse_request() {
    let body = request_body(&[b"zadd", b"board", b"1.5", b""]);
    let args = parse_request(&body, MAX_ARGS).unwrap();

    assert_eq!(
        args,
        vec![b"zadd".to_vec(), b"board".to_vec(), b"1.5".to_vec(), Vec::new()]
    );
}

#[test]
fn test_parse_empty_request() {
    let args = parse_request(&0u32.to_le_bytes(), MAX_ARGS).unwrap();
    assert!(args.is_empty());
}

#[test]
fn test_parse_request_rejects_truncation() {
    let body = request_body(&[b"get", b"somekey"]);
    for cut in 0..body.len() {
        assert!(
            parse_request(&body[..cut], MAX_ARGS).is_err(),
            "accepted a body cut at {}",
            cut
        );
    }
}

#[test]
fn test_parse_request_rejects_trailing_bytes() {
    let mut body = request_body(&[b"keys"]);
    body.push(0);
    assert!(matches!(
        parse_request(&body, MAX_ARGS),
        Err(TideError::Protocol(_))
    ));
}

#[test]
fn test_parse_request_rejects_too_many_args() {
    let body = request_body(&[b"a", b"b", b"c"]);
    assert!(matches!(
        parse_request(&body, 2),
        Err(TideError::TooManyArgs { count: 3, max: 2 })
    ));
}

#[test]
fn test_encode_request_rejects_oversized() {
    let big = vec![0u8; 100];
    assert!(matches!(
        encode_request(&[big], 64),
        Err(TideError::MessageTooLarge { .. })
    ));
}

// =============================================================================
// Framing Tests
// =============================================================================

#[test]
fn test_frame_len_needs_complete_frame() {
    let frame = encode_request(&["get", "k"], MAX_MESSAGE_SIZE).unwrap();

    for cut in 0..frame.len() {
        assert_eq!(frame_len(&frame[..cut], MAX_MESSAGE_SIZE).unwrap(), None);
    }
    assert_eq!(
        frame_len(&frame, MAX_MESSAGE_SIZE).unwrap(),
        Some(frame.len() - HEADER_SIZE)
    );
}

#[test]
fn test_frame_len_rejects_oversized_header() {
    let header = 1000u32.to_le_bytes();
    assert!(matches!(
        frame_len(&header, 999),
        Err(TideError::MessageTooLarge {
            size: 1000,
            max: 999
        })
    ));
}

// =============================================================================
// Response Tests
// =============================================================================

#[test]
fn test_response_tags_on_the_wire() {
    let mut buf = MessageBuffer::new();
    {
        let mut out = ReplyWriter::new(&mut buf);
        out.nil();
        out.int(-1);
    }
    let bytes = buf.readable();
    assert_eq!(bytes[0], Tag::Nil as u8);
    assert_eq!(bytes[1], Tag::Int as u8);
    assert_eq!(&bytes[2..10], &(-1i64).to_le_bytes());
}

#[test]
fn test_scalar_responses() {
    for value in [
        Response::Nil,
        Response::Int(i64::MIN),
        Response::Dbl(-0.25),
        Response::str("hello"),
        Response::str(""),
        Response::error(ErrorCode::Type, "expect zset"),
    ] {
        assert_eq!(frame_round_trip(&value), value);
    }
}

#[test]
fn test_nested_array_response() {
    let value = Response::Arr(vec![
        Response::str("a"),
        Response::Arr(vec![Response::Int(1), Response::Nil]),
        Response::Arr(Vec::new()),
        Response::Dbl(2.0),
    ]);
    assert_eq!(frame_round_trip(&value), value);
}

#[test]
fn test_deferred_array_count() {
    let mut buf = MessageBuffer::new();
    begin_response(&mut buf);
    {
        let mut out = ReplyWriter::new(&mut buf);
        out.begin_array();
        for i in 0..3 {
            out.int(i);
        }
        out.end_array(3);
    }
    end_response(&mut buf, MAX_MESSAGE_SIZE);

    assert_eq!(buf.pending_placeholders(), 0);
    let body = &buf.readable()[HEADER_SIZE..];
    assert_eq!(
        decode_response(body).unwrap(),
        Response::Arr(vec![Response::Int(0), Response::Int(1), Response::Int(2)])
    );
}

#[test]
fn test_oversized_response_becomes_error() {
    let mut buf = MessageBuffer::new();
    buf.append(b"earlier frame");
    begin_response(&mut buf);
    ReplyWriter::new(&mut buf).str(&[b'x'; 200]);
    end_response(&mut buf, 100);

    let frame = &buf.readable()[b"earlier frame".len()..];
    let len = frame_len(frame, 100).unwrap().unwrap();
    assert_eq!(
        decode_response(&frame[HEADER_SIZE..HEADER_SIZE + len]).unwrap(),
        Response::error(ErrorCode::TooBig, "response is too big")
    );
}

#[test]
fn test_decode_rejects_bad_input() {
    // unknown tag
    assert!(decode_response(&[9]).is_err());
    // truncated int
    assert!(decode_response(&[Tag::Int as u8, 1, 2]).is_err());
    // string longer than the body
    assert!(decode_response(&[Tag::Str as u8, 5, 0, 0, 0, b'a']).is_err());
    // array promising more elements than present
    assert!(decode_response(&[Tag::Arr as u8, 2, 0, 0, 0, Tag::Nil as u8]).is_err());
    // trailing bytes
    assert!(decode_response(&[Tag::Nil as u8, 0]).is_err());
    // empty body
    assert!(decode_response(&[]).is_err());
}

#[test]
fn test_decode_rejects_deep_nesting() {
    let mut body = Vec::new();
    for _ in 0..100 {
        body.push(Tag::Arr as u8);
        body.extend_from_slice(&1u32.to_le_bytes());
    }
    body.push(Tag::Nil as u8);
    assert!(decode_response(&body).is_err());
}

#[test]
fn test_response_display() {
    assert_eq!(Response::Nil.to_string(), "(nil)");
    assert_eq!(Response::Int(3).to_string(), "(int) 3");
    assert_eq!(Response::Dbl(1.5).to_string(), "(dbl) 1.5");
    assert_eq!(Response::str("v").to_string(), "(str) v");
    assert_eq!(
        Response::error(ErrorCode::Unknown, "unknown command").to_string(),
        "(err) 1 unknown command"
    );
    assert_eq!(
        Response::Arr(vec![Response::Int(1)]).to_string(),
        "(arr) len=1\n(int) 1\n(arr) end"
    );
}

// =============================================================================
// Stream Tests
// =============================================================================

#[test]
fn test_stream_helpers() {
    let mut wire = Vec::new();
    write_request(&mut wire, &["get", "k"], MAX_MESSAGE_SIZE).unwrap();
    let len = frame_len(&wire, MAX_MESSAGE_SIZE).unwrap().unwrap();
    assert_eq!(
        parse_request(&wire[HEADER_SIZE..HEADER_SIZE + len], MAX_ARGS).unwrap(),
        vec![b"get".to_vec(), b"k".to_vec()]
    );

    let mut buf = MessageBuffer::new();
    encode_response(&mut buf, &Response::str("v"), MAX_MESSAGE_SIZE);
    encode_response(&mut buf, &Response::Nil, MAX_MESSAGE_SIZE);
    let mut reader = Cursor::new(buf.readable().to_vec());
    assert_eq!(read_response(&mut reader, MAX_MESSAGE_SIZE).unwrap(), Response::str("v"));
    assert_eq!(read_response(&mut reader, MAX_MESSAGE_SIZE).unwrap(), Response::Nil);
    assert!(matches!(
        read_response(&mut reader, MAX_MESSAGE_SIZE),
        Err(TideError::Io(_))
    ));
}
