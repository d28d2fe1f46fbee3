// RESP Protocol Parser

use super::{parse_integer, read_line, RespError, RespValue, Result};
use bytes::{Bytes, BytesMut};
use std::io::Cursor;

/// Upper bound on a single bulk argument, mirrors proto-max-bulk-len
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

pub struct RespParser;

impl RespParser {
    /// Parse a complete RESP value from a byte buffer
    pub fn parse(buf: &[u8]) -> Result<RespValue> {
        let mut cursor = Cursor::new(buf);
        Self::parse_value(&mut cursor)
    }

    /// Split the next client request off `buf`, returning its argument vector.
    ///
    /// Requests are either multibulk arrays or inline (space separated) lines.
    /// Returns `Ok(None)` when the buffer does not yet hold a whole request.
    pub fn next_command(buf: &mut BytesMut) -> Result<Option<Vec<Bytes>>> {
        if buf.is_empty() {
            return Ok(None);
        }

        if buf[0] != b'*' {
            return Self::next_inline(buf);
        }

        let len = match Self::check_complete(buf)? {
            Some(len) => len,
            None => return Ok(None),
        };
        let frame = buf.split_to(len);
        match Self::parse(&frame)? {
            RespValue::Array(Some(items)) => {
                let mut argv = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        RespValue::BulkString(Some(data)) => argv.push(Bytes::from(data)),
                        _ => {
                            return Err(RespError::InvalidProtocol(
                                "expected '$', got something else".to_string(),
                            ))
                        }
                    }
                }
                Ok(Some(argv))
            }
            RespValue::Array(None) => Ok(Some(Vec::new())),
            _ => Err(RespError::InvalidArrayLength),
        }
    }

    fn next_inline(buf: &mut BytesMut) -> Result<Option<Vec<Bytes>>> {
        let end = match super::find_crlf(buf) {
            Some(end) => end,
            None => return Ok(None),
        };
        let line = buf.split_to(end + 2);
        let argv = line[..end]
            .split(|b| *b == b' ')
            .filter(|part| !part.is_empty())
            .map(Bytes::copy_from_slice)
            .collect();
        Ok(Some(argv))
    }

    /// Parse RESP value from cursor
    fn parse_value(cursor: &mut Cursor<&[u8]>) -> Result<RespValue> {
        if cursor.position() >= cursor.get_ref().len() as u64 {
            return Err(RespError::Incomplete);
        }

        let type_byte = cursor.get_ref()[cursor.position() as usize];
        cursor.set_position(cursor.position() + 1);

        match type_byte {
            b'+' => {
                let line = read_line(cursor)?;
                Ok(RespValue::SimpleString(String::from_utf8(line.to_vec())?))
            }
            b'-' => {
                let line = read_line(cursor)?;
                Ok(RespValue::Error(String::from_utf8(line.to_vec())?))
            }
            b':' => Ok(RespValue::Integer(parse_integer(read_line(cursor)?)?)),
            b'$' => Self::parse_bulk_string(cursor),
            b'*' => Self::parse_array(cursor),
            _ => Err(RespError::InvalidProtocol(format!(
                "Unknown type byte: {}",
                type_byte as char
            ))),
        }
    }

    /// Parse bulk string: $6\r\nfoobar\r\n or $-1\r\n (null)
    fn parse_bulk_string(cursor: &mut Cursor<&[u8]>) -> Result<RespValue> {
        let len = parse_integer(read_line(cursor)?)?;

        if len == -1 {
            return Ok(RespValue::BulkString(None));
        }
        if !(0..=MAX_BULK_LEN).contains(&len) {
            return Err(RespError::InvalidBulkStringLength);
        }

        let start = cursor.position() as usize;
        let end = start + len as usize;

        if end + 2 > cursor.get_ref().len() {
            return Err(RespError::Incomplete);
        }
        if cursor.get_ref()[end..end + 2] != *b"\r\n" {
            return Err(RespError::InvalidProtocol(
                "Missing CRLF after bulk string".to_string(),
            ));
        }

        let data = cursor.get_ref()[start..end].to_vec();
        cursor.set_position((end + 2) as u64);
        Ok(RespValue::BulkString(Some(data)))
    }

    /// Parse array: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n or *-1\r\n (null)
    fn parse_array(cursor: &mut Cursor<&[u8]>) -> Result<RespValue> {
        let len = parse_integer(read_line(cursor)?)?;

        if len == -1 {
            return Ok(RespValue::Array(None));
        }
        if len < -1 {
            return Err(RespError::InvalidArrayLength);
        }

        // Cap the pre-allocation; a hostile length must not reserve memory up front
        let mut arr = Vec::with_capacity((len as usize).min(1024));
        for _ in 0..len {
            arr.push(Self::parse_value(cursor)?);
        }

        Ok(RespValue::Array(Some(arr)))
    }

    /// Check if buffer contains a complete RESP value
    pub fn check_complete(buf: &[u8]) -> Result<Option<usize>> {
        let mut cursor = Cursor::new(buf);
        match Self::parse_value(&mut cursor) {
            Ok(_) => Ok(Some(cursor.position() as usize)),
            Err(RespError::Incomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
