use crate::http::headers::HeaderMap;

/// Progress of a [`Request`] through the parser.
///
/// The body state is passed through without consuming anything when the
/// request declares no positive `Content-Length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Initial,
    ParsingHeaders,
    ParsingBody,
    Done,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub request_target: String,
    pub http_version: String,
}

#[derive(Debug)]
pub struct Request {
    pub request_line: RequestLine,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub(crate) state: ParserState,
}

impl Request {
    pub fn new() -> Self {
        Self {
            request_line: RequestLine::default(),
            headers: HeaderMap::new(),
            body: Vec::new(),
            state: ParserState::Initial,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ParserState::Done
    }

    pub fn method(&self) -> &str {
        &self.request_line.method
    }

    pub fn target(&self) -> &str {
        &self.request_line.request_target
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}
