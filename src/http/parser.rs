//! Incremental HTTP/1.1 request parser.
//!
//! [`Request::parse`] is a pure state machine: it is handed whatever bytes
//! are currently buffered, consumes as much as it can and reports how many
//! bytes it used. It never assumes read boundaries line up with line or body
//! boundaries; a `0` return simply means "come back with more input".
//!
//! [`Request::from_reader`] drives that state machine from any async byte
//! source, keeping unconsumed bytes at the front of a buffer that doubles in
//! size whenever it fills up.

use std::io::ErrorKind;
use std::time::Duration;

use async_std::io::{self, Read, ReadExt};
use thiserror::Error;
use tracing::trace;

use crate::http::headers::{HeaderError, find_crlf};
use crate::http::request::{ParserState, Request, RequestLine};
use crate::http::validator::{is_supported_version, is_valid_method};
use crate::http::CRLF;

/// Capacity of the read buffer before the first doubling.
pub const INITIAL_BUFFER_CAP: usize = 8;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("poorly formatted request-line: {0:?}")]
    MalformedRequestLine(String),

    #[error("invalid method: {0:?}")]
    InvalidMethod(String),

    #[error("unrecognized HTTP-version: {0:?}")]
    UnsupportedVersion(String),

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error("body larger than Content-Length (expected {expected}, got {received}+)")]
    BodyTooLarge { expected: usize, received: usize },

    #[error("incomplete request (end of stream before the request was complete)")]
    Incomplete,

    #[error("I/O error while reading request: {0}")]
    Io(#[from] std::io::Error),
}

impl Request {
    /// Feeds `data` through as many parser steps as it can satisfy.
    ///
    /// Returns the number of bytes consumed; the caller must drop those from
    /// the front of its buffer and call again once more bytes have arrived.
    pub fn parse(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        let mut total = 0;

        while self.state != ParserState::Done {
            let n = self.parse_single(&data[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }

        Ok(total)
    }

    fn parse_single(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        match self.state {
            ParserState::Initial => {
                let Some((request_line, consumed)) = parse_request_line(data)? else {
                    return Ok(0);
                };
                self.request_line = request_line;
                self.state = ParserState::ParsingHeaders;
                Ok(consumed)
            }
            ParserState::ParsingHeaders => {
                let (consumed, done) = self.headers.parse(data)?;
                if done {
                    self.state = ParserState::ParsingBody;
                }
                Ok(consumed)
            }
            ParserState::ParsingBody => self.parse_body(data),
            ParserState::Done => Ok(0),
        }
    }

    fn parse_body(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        let declared = match self.content_length() {
            Some(n) => n,
            None => {
                self.state = ParserState::Done;
                return Ok(0);
            }
        };

        self.body.extend_from_slice(data);

        if self.body.len() > declared {
            return Err(ParseError::BodyTooLarge {
                expected: declared,
                received: self.body.len(),
            });
        }

        if self.body.len() == declared {
            self.state = ParserState::Done;
        }

        Ok(data.len())
    }

    /// The declared body length, or `None` when the header is absent,
    /// not a number, or not positive.
    fn content_length(&self) -> Option<usize> {
        let n = self.headers.get("content-length")?.parse::<i64>().ok()?;
        usize::try_from(n).ok().filter(|&n| n > 0)
    }

    /// Reads and parses a single request from `reader`.
    pub async fn from_reader<R>(reader: R) -> Result<Request, ParseError>
    where
        R: Read + Unpin,
    {
        Self::from_reader_with(reader, INITIAL_BUFFER_CAP, None).await
    }

    /// Like [`from_reader`](Self::from_reader), with an explicit initial
    /// buffer capacity and an optional per-read timeout.
    pub async fn from_reader_with<R>(
        mut reader: R,
        capacity: usize,
        read_timeout: Option<Duration>,
    ) -> Result<Request, ParseError>
    where
        R: Read + Unpin,
    {
        let mut req = Request::new();
        let mut buf = vec![0; capacity.max(1)];
        let mut read_to = 0;

        while !req.is_done() {
            if read_to == buf.len() {
                buf.resize(buf.len() * 2, 0);
                trace!(capacity = buf.len(), "grew request buffer");
            }

            let read = match read_timeout {
                Some(dur) => io::timeout(dur, reader.read(&mut buf[read_to..])).await,
                None => reader.read(&mut buf[read_to..]).await,
            };

            let n = match read {
                Ok(0) => return Err(ParseError::Incomplete),
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ParseError::Io(e)),
            };
            read_to += n;

            let parsed = req.parse(&buf[..read_to])?;
            buf.copy_within(parsed..read_to, 0);
            read_to -= parsed;
        }

        Ok(req)
    }
}

/// Parses `METHOD SP TARGET SP HTTP/1.1 CRLF` from the front of `data`.
///
/// `Ok(None)` means no complete line is buffered yet.
fn parse_request_line(data: &[u8]) -> Result<Option<(RequestLine, usize)>, ParseError> {
    let Some(idx) = find_crlf(data) else {
        return Ok(None);
    };

    let raw = &data[..idx];
    let line = std::str::from_utf8(raw)
        .map_err(|_| ParseError::MalformedRequestLine(String::from_utf8_lossy(raw).into_owned()))?;

    let parts: Vec<&str> = line.split(' ').collect();
    let [method, target, version] = parts[..] else {
        return Err(ParseError::MalformedRequestLine(line.to_string()));
    };

    if !is_valid_method(method) {
        return Err(ParseError::InvalidMethod(method.to_string()));
    }

    if !is_supported_version(version) {
        return Err(ParseError::UnsupportedVersion(version.to_string()));
    }

    let request_line = RequestLine {
        method: method.to_string(),
        request_target: target.to_string(),
        http_version: version["HTTP/".len()..].to_string(),
    };

    Ok(Some((request_line, idx + CRLF.len())))
}
