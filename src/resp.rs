//! Client-side RESP2 codec.
//!
//! Commands go out as arrays of bulk strings; replies come back as any of
//! the RESP2 reply types. This is the monitoring side of the protocol, so
//! only the types a probe can receive are modeled.

use bytes::Bytes;

/// A decoded RESP2 reply.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple string: +OK\r\n
    SimpleString(Bytes),
    /// Error: -ERR message\r\n
    Error(Bytes),
    /// Integer: :1000\r\n
    Integer(i64),
    /// Bulk string: $5\r\nhello\r\n
    BulkString(Bytes),
    /// Null bulk string: $-1\r\n
    Null,
    /// Null array: *-1\r\n
    NullArray,
    /// Array: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Raw bytes of a string-carrying reply.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            RespValue::SimpleString(b) | RespValue::BulkString(b) | RespValue::Error(b) => Some(b),
            _ => None,
        }
    }

    /// UTF-8 view of a string-carrying reply.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Integer value, accepting bulk strings that hold a number.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            RespValue::Integer(n) => Some(*n),
            RespValue::BulkString(b) | RespValue::SimpleString(b) => {
                std::str::from_utf8(b).ok()?.parse().ok()
            }
            _ => None,
        }
    }

    pub fn is_pong(&self) -> bool {
        match self {
            RespValue::SimpleString(s) | RespValue::BulkString(s) => {
                s.eq_ignore_ascii_case(b"PONG")
            }
            _ => false,
        }
    }
}

/// Parse error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Need more data to complete parsing
    Incomplete,
    /// Invalid RESP format
    Invalid(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incomplete => write!(f, "incomplete data"),
            Self::Invalid(msg) => write!(f, "invalid format: {}", msg),
        }
    }
}

impl std::error::Error for ParseError {}

/// Encode a command as a RESP array of bulk strings.
pub fn encode_command(args: &[&[u8]]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    let mut itoa_buf = itoa::Buffer::new();

    buf.push(b'*');
    buf.extend_from_slice(itoa_buf.format(args.len()).as_bytes());
    buf.extend_from_slice(b"\r\n");
    for arg in args {
        buf.push(b'$');
        buf.extend_from_slice(itoa_buf.format(arg.len()).as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }
    buf
}

/// Parse one complete reply from the front of `buffer`.
///
/// Returns (value, bytes_consumed) on success.
pub fn parse_reply(buffer: &[u8]) -> Result<(RespValue, usize), ParseError> {
    parse_value(buffer, 0)
}

fn parse_value(buffer: &[u8], pos: usize) -> Result<(RespValue, usize), ParseError> {
    if pos >= buffer.len() {
        return Err(ParseError::Incomplete);
    }

    let prefix = buffer[pos];
    let (line, next) = read_line(buffer, pos + 1)?;

    match prefix {
        b'+' => Ok((RespValue::SimpleString(Bytes::copy_from_slice(line)), next)),
        b'-' => Ok((RespValue::Error(Bytes::copy_from_slice(line)), next)),
        b':' => {
            let n = parse_line_integer(line)?;
            Ok((RespValue::Integer(n), next))
        }
        b'$' => {
            let len = parse_line_integer(line)?;
            if len < 0 {
                return Ok((RespValue::Null, next));
            }
            let len = len as usize;
            if next + len + 2 > buffer.len() {
                return Err(ParseError::Incomplete);
            }
            if &buffer[next + len..next + len + 2] != b"\r\n" {
                return Err(ParseError::Invalid(
                    "bulk string not CRLF terminated".to_string(),
                ));
            }
            let data = Bytes::copy_from_slice(&buffer[next..next + len]);
            Ok((RespValue::BulkString(data), next + len + 2))
        }
        b'*' => {
            let len = parse_line_integer(line)?;
            if len < 0 {
                return Ok((RespValue::NullArray, next));
            }
            let mut items = Vec::with_capacity(len as usize);
            let mut pos = next;
            for _ in 0..len {
                let (item, after) = parse_value(buffer, pos)?;
                items.push(item);
                pos = after;
            }
            Ok((RespValue::Array(items), pos))
        }
        other => Err(ParseError::Invalid(format!(
            "unexpected reply prefix 0x{:02x}",
            other
        ))),
    }
}

/// Slice up to the next CRLF, returning (line, position after CRLF).
fn read_line(buffer: &[u8], pos: usize) -> Result<(&[u8], usize), ParseError> {
    let rest = &buffer[pos.min(buffer.len())..];
    match rest.windows(2).position(|w| w == b"\r\n") {
        Some(idx) => Ok((&rest[..idx], pos + idx + 2)),
        None => Err(ParseError::Incomplete),
    }
}

fn parse_line_integer(line: &[u8]) -> Result<i64, ParseError> {
    let num_str = std::str::from_utf8(line)
        .map_err(|_| ParseError::Invalid("invalid utf8 in integer".to_string()))?;
    num_str
        .parse()
        .map_err(|_| ParseError::Invalid("invalid integer".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command() {
        let buf = encode_command(&[b"SENTINEL", b"REPLICAS", b"mymaster"]);
        assert_eq!(
            buf,
            b"*3\r\n$8\r\nSENTINEL\r\n$8\r\nREPLICAS\r\n$8\r\nmymaster\r\n"
        );
    }

    #[test]
    fn test_parse_simple_string() {
        let (value, consumed) = parse_reply(b"+PONG\r\n").unwrap();
        assert!(value.is_pong());
        assert_eq!(consumed, 7);
    }

    #[test]
    fn test_parse_error_reply() {
        let (value, _) = parse_reply(b"-ERR unknown command\r\n").unwrap();
        assert_eq!(value.as_str(), Some("ERR unknown command"));
        assert!(matches!(value, RespValue::Error(_)));
    }

    #[test]
    fn test_parse_integer() {
        let (value, consumed) = parse_reply(b":42\r\n").unwrap();
        assert_eq!(value.as_int(), Some(42));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_parse_bulk_string() {
        let (value, consumed) = parse_reply(b"$5\r\nhello\r\nextra").unwrap();
        assert_eq!(value.as_str(), Some("hello"));
        assert_eq!(consumed, 11);
    }

    #[test]
    fn test_parse_null_bulk() {
        let (value, _) = parse_reply(b"$-1\r\n").unwrap();
        assert_eq!(value, RespValue::Null);
    }

    #[test]
    fn test_parse_nested_array() {
        // the shape SENTINEL MASTERS answers with: an array of pair arrays
        let wire = b"*1\r\n*4\r\n$4\r\nname\r\n$8\r\nmymaster\r\n$2\r\nip\r\n$9\r\n127.0.0.1\r\n";
        let (value, consumed) = parse_reply(wire).unwrap();
        assert_eq!(consumed, wire.len());
        match value {
            RespValue::Array(items) => {
                assert_eq!(items.len(), 1);
                match &items[0] {
                    RespValue::Array(pairs) => {
                        assert_eq!(pairs.len(), 4);
                        assert_eq!(pairs[1].as_str(), Some("mymaster"));
                    }
                    other => panic!("expected inner array, got {:?}", other),
                }
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_incomplete() {
        assert_eq!(parse_reply(b""), Err(ParseError::Incomplete));
        assert_eq!(parse_reply(b"$5\r\nhel"), Err(ParseError::Incomplete));
        assert_eq!(parse_reply(b"*2\r\n:1\r\n"), Err(ParseError::Incomplete));
        assert_eq!(parse_reply(b"+PONG"), Err(ParseError::Incomplete));
    }

    #[test]
    fn test_parse_invalid_prefix() {
        assert!(matches!(
            parse_reply(b"@oops\r\n"),
            Err(ParseError::Invalid(_))
        ));
    }

    #[test]
    fn test_as_int_from_bulk() {
        let (value, _) = parse_reply(b"$4\r\n6379\r\n").unwrap();
        assert_eq!(value.as_int(), Some(6379));
    }
}
