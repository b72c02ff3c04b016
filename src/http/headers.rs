//! HTTP headers abstraction shared by [`Request`](crate::http::request::Request)
//! and [`ResponseWriter`](crate::http::response::ResponseWriter).
//!
//! Header names are case-folded to lowercase on the way in, so every lookup
//! is case-insensitive. A name seen more than once keeps a single entry whose
//! value is the arrival-ordered list of values joined with `", "`.
//!
//! Headers are stored in an ordered map to preserve insertion order, which is
//! also the order they are serialized in.

use indexmap::IndexMap;
use thiserror::Error;

use crate::http::CRLF;
use crate::http::validator::is_token;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("malformed header (missing colon): {0:?}")]
    MissingColon(String),

    #[error("invalid header name (whitespace before colon): {0:?}")]
    InvalidName(String),

    #[error("invalid characters in header name: {0:?}")]
    InvalidCharacters(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    headers: IndexMap<String, String>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self {
            headers: IndexMap::new(),
        }
    }

    /// Parses at most one header line from the front of `data`.
    ///
    /// Returns the number of bytes consumed and whether the blank line ending
    /// the header block was reached. `(0, false)` means `data` does not hold a
    /// complete line yet and the caller must come back with more bytes.
    pub fn parse(&mut self, data: &[u8]) -> Result<(usize, bool), HeaderError> {
        let Some(idx) = find_crlf(data) else {
            return Ok((0, false));
        };

        if idx == 0 {
            return Ok((CRLF.len(), true));
        }

        // Values may carry obs-text (bytes >= 0x80), so only the name is
        // required to be text.
        let line = &data[..idx];
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            return Err(HeaderError::MissingColon(
                String::from_utf8_lossy(line).into_owned(),
            ));
        };
        let (name, value) = (&line[..colon], &line[colon + 1..]);

        if name.last().is_some_and(u8::is_ascii_whitespace) {
            return Err(HeaderError::InvalidName(
                String::from_utf8_lossy(name).into_owned(),
            ));
        }

        let name = String::from_utf8_lossy(name);
        if !is_token(&name) {
            return Err(HeaderError::InvalidCharacters(name.into_owned()));
        }

        self.append(&name, String::from_utf8_lossy(value).trim());

        Ok((idx + CRLF.len(), false))
    }

    /// Adds `value` under `name`, merging with any previous value.
    pub fn append(&mut self, name: &str, value: &str) {
        self.headers
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    /// Replaces the value stored under `name`.
    ///
    /// An existing entry keeps its position; a new one goes last.
    pub fn set(&mut self, name: &str, value: &str) {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serializes every header as `name: value\r\n`, without the blank line
    /// that terminates a header block.
    pub fn stringify(&self) -> String {
        let mut result = String::new();
        for (name, value) in &self.headers {
            result.push_str(name);
            result.push_str(": ");
            result.push_str(value);
            result.push_str(CRLF);
        }
        result
    }
}

pub(crate) fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(CRLF.len()).position(|w| w == CRLF.as_bytes())
}
