use bytes::{Buf, Bytes, BytesMut};

use super::types::RespValue;

/// Deepest array nesting accepted in a reply; sentinel replies use two levels
pub const MAX_DEPTH: usize = 32;

/// Parse error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Invalid RESP format
    #[error("invalid reply: {0}")]
    Invalid(String),

    #[error("invalid reply: arrays nested deeper than {MAX_DEPTH} levels")]
    TooDeep,
}

type ParseResult<T> = std::result::Result<T, ParseError>;

/// Incremental RESP reply parser
pub struct Parser;

impl Parser {
    /// Parse a complete RESP value from buffer.
    /// Returns None if buffer doesn't contain a complete message.
    /// Advances buffer past the parsed data.
    #[inline]
    pub fn parse(buf: &mut BytesMut) -> ParseResult<Option<RespValue>> {
        if buf.is_empty() {
            return Ok(None);
        }

        match Self::parse_value(buf, 0)? {
            Some((value, consumed)) => {
                buf.advance(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Parse value, returning (value, bytes_consumed) or None if incomplete
    fn parse_value(buf: &[u8], depth: usize) -> ParseResult<Option<(RespValue, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        match buf[0] {
            b'+' => Self::parse_line(buf, RespValue::SimpleString),
            b'-' => Self::parse_line(buf, RespValue::Error),
            b':' => Self::parse_integer(buf),
            b'$' => Self::parse_bulk_string(buf),
            b'*' => Self::parse_array(buf, depth),
            other => Err(ParseError::Invalid(format!(
                "unexpected type byte 0x{:02x}",
                other
            ))),
        }
    }

    /// Find \r\n in buffer, return position of \r
    #[inline]
    fn find_crlf(buf: &[u8]) -> Option<usize> {
        memchr::memchr(b'\r', buf).and_then(|pos| {
            if pos + 1 < buf.len() && buf[pos + 1] == b'\n' {
                Some(pos)
            } else {
                None
            }
        })
    }

    fn parse_line(
        buf: &[u8],
        wrap: fn(Bytes) -> RespValue,
    ) -> ParseResult<Option<(RespValue, usize)>> {
        match Self::find_crlf(buf) {
            Some(pos) => {
                let s = Bytes::copy_from_slice(&buf[1..pos]);
                Ok(Some((wrap(s), pos + 2)))
            }
            None => Ok(None),
        }
    }

    fn parse_length(buf: &[u8], crlf_pos: usize, what: &str) -> ParseResult<i64> {
        std::str::from_utf8(&buf[1..crlf_pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ParseError::Invalid(format!("invalid {}", what)))
    }

    fn parse_integer(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        match Self::find_crlf(buf) {
            Some(pos) => {
                let n = Self::parse_length(buf, pos, "integer")?;
                Ok(Some((RespValue::Integer(n), pos + 2)))
            }
            None => Ok(None),
        }
    }

    fn parse_bulk_string(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let crlf_pos = match Self::find_crlf(buf) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let len = Self::parse_length(buf, crlf_pos, "bulk length")?;
        if len == -1 {
            return Ok(Some((RespValue::Null, crlf_pos + 2)));
        }
        if len < 0 {
            return Err(ParseError::Invalid("negative bulk length".to_string()));
        }

        let len = len as usize;
        let data_start = crlf_pos + 2;
        let data_end = data_start + len;
        let total_len = data_end + 2; // +2 for trailing \r\n

        if buf.len() < total_len {
            return Ok(None);
        }

        let data = Bytes::copy_from_slice(&buf[data_start..data_end]);
        Ok(Some((RespValue::BulkString(data), total_len)))
    }

    fn parse_array(buf: &[u8], depth: usize) -> ParseResult<Option<(RespValue, usize)>> {
        if depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep);
        }

        let crlf_pos = match Self::find_crlf(buf) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let len = Self::parse_length(buf, crlf_pos, "array length")?;
        if len == -1 {
            return Ok(Some((RespValue::Null, crlf_pos + 2)));
        }
        if len < 0 {
            return Err(ParseError::Invalid("negative array length".to_string()));
        }

        let len = len as usize;
        let mut items = Vec::with_capacity(len.min(1024));
        let mut offset = crlf_pos + 2;

        for _ in 0..len {
            match Self::parse_value(&buf[offset..], depth + 1)? {
                Some((value, consumed)) => {
                    items.push(value);
                    offset += consumed;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((RespValue::Array(items), offset)))
    }
}
