// Protocol module - RESP2 parser and serializer

use std::io::Cursor;
use thiserror::Error;

pub mod parser;
pub mod serializer;

pub use parser::RespParser;
pub use serializer::RespSerializer;

/// RESP (REdis Serialization Protocol) value types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Simple string: +OK\r\n
    SimpleString(String),
    /// Error: -ERR unknown command\r\n
    Error(String),
    /// Integer: :1000\r\n
    Integer(i64),
    /// Bulk string: $6\r\nfoobar\r\n (None for null bulk string)
    BulkString(Option<Vec<u8>>),
    /// Array: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n (None for null array)
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// `+OK`
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// Bulk string from anything byte-like
    pub fn bulk(data: impl AsRef<[u8]>) -> Self {
        RespValue::BulkString(Some(data.as_ref().to_vec()))
    }

    /// `$-1`
    pub fn nil_bulk() -> Self {
        RespValue::BulkString(None)
    }

    /// `*-1`
    pub fn nil_array() -> Self {
        RespValue::Array(None)
    }

    /// Array of bulk strings
    pub fn bulk_array<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        RespValue::Array(Some(items.into_iter().map(RespValue::bulk).collect()))
    }

    /// Convert to bulk string if possible
    pub fn as_bulk_string(&self) -> Option<&[u8]> {
        match self {
            RespValue::BulkString(Some(s)) => Some(s),
            _ => None,
        }
    }

    /// Convert to integer if possible
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert to array if possible
    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(Some(arr)) => Some(arr),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::BulkString(None) | RespValue::Array(None))
    }
}

#[derive(Error, Debug)]
pub enum RespError {
    #[error("Incomplete data")]
    Incomplete,

    #[error("Protocol error: {0}")]
    InvalidProtocol(String),

    #[error("Protocol error: invalid integer {0}")]
    InvalidInteger(String),

    #[error("Protocol error: invalid bulk length")]
    InvalidBulkStringLength,

    #[error("Protocol error: invalid multibulk length")]
    InvalidArrayLength,

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, RespError>;

/// Helper function to find CRLF in buffer
pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Helper function to read a line from cursor
pub(crate) fn read_line<'a>(cursor: &mut Cursor<&'a [u8]>) -> Result<&'a [u8]> {
    let start = cursor.position() as usize;
    let slice = &cursor.get_ref()[start..];

    let end = find_crlf(slice).ok_or(RespError::Incomplete)?;

    cursor.set_position((start + end + 2) as u64);
    Ok(&slice[..end])
}

/// Helper function to parse integer from bytes
pub(crate) fn parse_integer(buf: &[u8]) -> Result<i64> {
    std::str::from_utf8(buf)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| RespError::InvalidInteger(String::from_utf8_lossy(buf).into_owned()))
}
