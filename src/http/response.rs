//! Ordered HTTP/1.1 response emission.
//!
//! A [`ResponseWriter`] walks through `status line → headers → body` exactly
//! once. The body is either written in one piece with
//! [`write_body`](ResponseWriter::write_body), or streamed with
//! [`write_chunked_body`](ResponseWriter::write_chunked_body) and terminated
//! with [`write_trailers`](ResponseWriter::write_trailers).
//!
//! The status line and header block are held by the writer until the body
//! step, so that `write_body` can still add `connection` and
//! `content-length` to the single head that goes out on the wire.

use async_std::io::{Write, WriteExt};
use thiserror::Error;

use crate::http::headers::HeaderMap;
use crate::http::status::StatusCode;
use crate::http::{CRLF, HTTP_VERSION};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Init,
    StatusWritten,
    HeadersWritten,
    BodyWritten,
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("response written out of order: expected state {expected:?}, writer is in {actual:?}")]
    OutOfOrder {
        expected: WriterState,
        actual: WriterState,
    },

    #[error("unrecognized status code: {0}")]
    UnrecognizedStatus(u16),

    #[error("cannot write a plain body after chunked output has started")]
    BodyAfterChunks,

    #[error("trailers require at least one chunk to have been written")]
    TrailersWithoutChunks,

    #[error("I/O error while writing response: {0}")]
    Io(#[from] std::io::Error),
}

/// Headers attached to responses rendered by the server itself.
pub fn default_headers(content_len: usize) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.set("content-length", &content_len.to_string());
    headers.set("connection", "close");
    headers.set("content-type", "text/plain");
    headers
}

pub struct ResponseWriter<W> {
    writer: W,
    state: WriterState,
    status_line: String,
    headers: HeaderMap,
    chunked: bool,
}

impl<W> ResponseWriter<W>
where
    W: Write + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            state: WriterState::Init,
            status_line: String::new(),
            headers: HeaderMap::new(),
            chunked: false,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub async fn write_status_line(&mut self, code: u16) -> Result<(), WriteError> {
        self.expect_state(WriterState::Init)?;
        let status = StatusCode::try_from(code)?;

        self.status_line = format!(
            "HTTP/{} {} {}{}",
            HTTP_VERSION,
            status.as_u16(),
            status.reason(),
            CRLF
        );
        self.state = WriterState::StatusWritten;
        Ok(())
    }

    /// Captures a copy of `headers`; later changes to the caller's map do not
    /// reach the response.
    ///
    /// Nothing is sent yet. The head goes out with [`write_body`] or the first
    /// non-empty [`write_chunked_body`], so a response without a body still
    /// has to call `write_body(b"")` to reach the wire.
    ///
    /// [`write_body`]: Self::write_body
    /// [`write_chunked_body`]: Self::write_chunked_body
    pub async fn write_headers(&mut self, headers: &HeaderMap) -> Result<(), WriteError> {
        self.expect_state(WriterState::StatusWritten)?;
        self.headers = headers.clone();
        self.state = WriterState::HeadersWritten;
        Ok(())
    }

    /// Writes the head and the whole body in one go.
    ///
    /// `connection: close` is added unless a `connection` header was given,
    /// and `content-length` always reflects `body.len()`.
    pub async fn write_body(&mut self, body: &[u8]) -> Result<usize, WriteError> {
        self.expect_state(WriterState::HeadersWritten)?;
        if self.chunked {
            return Err(WriteError::BodyAfterChunks);
        }

        let mut headers = self.headers.clone();
        if !headers.contains("connection") {
            headers.set("connection", "close");
        }
        headers.set("content-length", &body.len().to_string());

        let mut out = self.render_head(&headers).into_bytes();
        out.extend_from_slice(body);
        self.send(&out).await?;

        self.headers = headers;
        self.state = WriterState::BodyWritten;
        Ok(body.len())
    }

    /// Emits `body` as one chunk of a chunked body.
    ///
    /// The first chunk also flushes the head, exactly as it was given; the
    /// caller is expected to have set `transfer-encoding: chunked`. An empty
    /// `body` writes nothing since a zero-length chunk ends the stream.
    pub async fn write_chunked_body(&mut self, body: &[u8]) -> Result<usize, WriteError> {
        self.expect_state(WriterState::HeadersWritten)?;
        if body.is_empty() {
            return Ok(0);
        }

        let mut out = Vec::with_capacity(body.len() + 16);
        if !self.chunked {
            out.extend_from_slice(self.render_head(&self.headers).as_bytes());
        }
        out.extend_from_slice(format!("{:x}{}", body.len(), CRLF).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(CRLF.as_bytes());
        self.send(&out).await?;

        self.chunked = true;
        Ok(body.len())
    }

    /// Ends a chunked body with the zero-length chunk, then `trailers`.
    ///
    /// Pass an empty map to end the body without trailers. Receivers only
    /// expect trailer names announced in a `trailer` response header.
    pub async fn write_trailers(&mut self, trailers: &HeaderMap) -> Result<(), WriteError> {
        self.expect_state(WriterState::HeadersWritten)?;
        if !self.chunked {
            return Err(WriteError::TrailersWithoutChunks);
        }

        let out = format!("0{}{}{}", CRLF, trailers.stringify(), CRLF);
        self.send(out.as_bytes()).await?;

        self.state = WriterState::BodyWritten;
        Ok(())
    }

    fn expect_state(&self, expected: WriterState) -> Result<(), WriteError> {
        if self.state != expected {
            return Err(WriteError::OutOfOrder {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    fn render_head(&self, headers: &HeaderMap) -> String {
        format!("{}{}{}", self.status_line, headers.stringify(), CRLF)
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn html_headers() -> HeaderMap {
        let mut h = HeaderMap::new();
        h.set("content-type", "text/html");
        h
    }

    fn written(w: ResponseWriter<Vec<u8>>) -> String {
        String::from_utf8(w.into_inner()).unwrap()
    }

    #[async_std::test]
    async fn simple_body_response() {
        let mut w = ResponseWriter::new(Vec::new());
        w.write_status_line(200).await.unwrap();
        w.write_headers(&html_headers()).await.unwrap();
        assert_eq!(w.write_body(b"hi").await.unwrap(), 2);
        assert_eq!(w.state(), WriterState::BodyWritten);

        assert_eq!(
            written(w),
            "HTTP/1.1 200 OK\r\n\
             content-type: text/html\r\n\
             connection: close\r\n\
             content-length: 2\r\n\
             \r\n\
             hi"
        );
    }

    #[async_std::test]
    async fn empty_body_still_sends_head() {
        let mut w = ResponseWriter::new(Vec::new());
        w.write_status_line(200).await.unwrap();
        w.write_headers(&HeaderMap::new()).await.unwrap();
        assert_eq!(w.write_body(b"").await.unwrap(), 0);

        assert_eq!(
            written(w),
            "HTTP/1.1 200 OK\r\n\
             connection: close\r\n\
             content-length: 0\r\n\
             \r\n"
        );
    }

    #[async_std::test]
    async fn nothing_reaches_the_sink_before_the_body() {
        let mut w = ResponseWriter::new(Vec::new());
        w.write_status_line(500).await.unwrap();
        w.write_headers(&html_headers()).await.unwrap();
        assert_eq!(w.state(), WriterState::HeadersWritten);
        assert!(w.into_inner().is_empty());
    }

    #[async_std::test]
    async fn content_length_is_always_recomputed() {
        let mut headers = HeaderMap::new();
        headers.set("Content-Length", "9999");
        headers.set("connection", "keep-alive");

        let mut w = ResponseWriter::new(Vec::new());
        w.write_status_line(400).await.unwrap();
        w.write_headers(&headers).await.unwrap();
        w.write_body(b"nope").await.unwrap();

        assert_eq!(
            written(w),
            "HTTP/1.1 400 Bad Request\r\n\
             content-length: 4\r\n\
             connection: keep-alive\r\n\
             \r\n\
             nope"
        );
    }

    #[async_std::test]
    async fn header_snapshot_ignores_later_mutation() {
        let mut headers = html_headers();
        let mut w = ResponseWriter::new(Vec::new());
        w.write_status_line(200).await.unwrap();
        w.write_headers(&headers).await.unwrap();

        headers.set("x-late", "too late");
        headers.set("content-type", "application/json");
        w.write_body(b"").await.unwrap();

        let out = written(w);
        assert!(out.contains("content-type: text/html\r\n"));
        assert!(!out.contains("x-late"));
        assert!(out.ends_with("content-length: 0\r\n\r\n"));
    }

    #[async_std::test]
    async fn out_of_order_calls_fail_and_write_nothing() {
        let mut w = ResponseWriter::new(Vec::new());

        let err = w.write_body(b"early").await.unwrap_err();
        assert!(matches!(
            err,
            WriteError::OutOfOrder {
                expected: WriterState::HeadersWritten,
                actual: WriterState::Init
            }
        ));
        assert!(w.write_headers(&html_headers()).await.is_err());
        assert!(w.write_chunked_body(b"x").await.is_err());
        assert!(w.write_trailers(&HeaderMap::new()).await.is_err());

        w.write_status_line(200).await.unwrap();
        let err = w.write_status_line(200).await.unwrap_err();
        assert!(matches!(
            err,
            WriteError::OutOfOrder {
                expected: WriterState::Init,
                actual: WriterState::StatusWritten
            }
        ));
        assert!(w.write_body(b"early").await.is_err());

        assert_eq!(w.state(), WriterState::StatusWritten);
        assert!(w.into_inner().is_empty());
    }

    #[async_std::test]
    async fn second_body_is_rejected() {
        let mut w = ResponseWriter::new(Vec::new());
        w.write_status_line(200).await.unwrap();
        w.write_headers(&HeaderMap::new()).await.unwrap();
        w.write_body(b"one").await.unwrap();

        let err = w.write_body(b"two").await.unwrap_err();
        assert!(matches!(
            err,
            WriteError::OutOfOrder {
                actual: WriterState::BodyWritten,
                ..
            }
        ));
        assert!(written(w).ends_with("\r\n\r\none"));
    }

    #[async_std::test]
    async fn unrecognized_status_is_rejected() {
        let mut w = ResponseWriter::new(Vec::new());
        let err = w.write_status_line(404).await.unwrap_err();
        assert!(matches!(err, WriteError::UnrecognizedStatus(404)));
        assert_eq!(w.state(), WriterState::Init);
        assert!(w.into_inner().is_empty());
    }

    #[async_std::test]
    async fn chunked_body_with_trailers() {
        let mut headers = HeaderMap::new();
        headers.set("transfer-encoding", "chunked");
        headers.set("trailer", "X-Content-Length");

        let mut w = ResponseWriter::new(Vec::new());
        w.write_status_line(200).await.unwrap();
        w.write_headers(&headers).await.unwrap();
        assert_eq!(w.write_chunked_body(b"hello ").await.unwrap(), 6);
        assert_eq!(w.write_chunked_body(b"").await.unwrap(), 0);
        assert_eq!(w.write_chunked_body(b"chunked world!").await.unwrap(), 14);
        assert_eq!(w.state(), WriterState::HeadersWritten);

        let mut trailers = HeaderMap::new();
        trailers.set("X-Content-Length", "20");
        w.write_trailers(&trailers).await.unwrap();
        assert_eq!(w.state(), WriterState::BodyWritten);

        assert_eq!(
            written(w),
            "HTTP/1.1 200 OK\r\n\
             transfer-encoding: chunked\r\n\
             trailer: X-Content-Length\r\n\
             \r\n\
             6\r\nhello \r\n\
             e\r\nchunked world!\r\n\
             0\r\n\
             x-content-length: 20\r\n\
             \r\n"
        );
    }

    #[async_std::test]
    async fn chunked_body_without_trailers() {
        let mut w = ResponseWriter::new(Vec::new());
        w.write_status_line(200).await.unwrap();
        w.write_headers(&HeaderMap::new()).await.unwrap();
        w.write_chunked_body(&[b'a'; 26]).await.unwrap();
        w.write_trailers(&HeaderMap::new()).await.unwrap();

        let out = written(w);
        assert!(out.ends_with("\r\n1a\r\naaaaaaaaaaaaaaaaaaaaaaaaaa\r\n0\r\n\r\n"));
    }

    #[async_std::test]
    async fn trailers_need_a_chunk_first() {
        let mut w = ResponseWriter::new(Vec::new());
        w.write_status_line(200).await.unwrap();
        w.write_headers(&HeaderMap::new()).await.unwrap();
        let err = w.write_trailers(&HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, WriteError::TrailersWithoutChunks));
        assert!(w.into_inner().is_empty());
    }

    #[async_std::test]
    async fn plain_body_after_chunks_is_rejected() {
        let mut w = ResponseWriter::new(Vec::new());
        w.write_status_line(200).await.unwrap();
        w.write_headers(&HeaderMap::new()).await.unwrap();
        w.write_chunked_body(b"abc").await.unwrap();
        let err = w.write_body(b"def").await.unwrap_err();
        assert!(matches!(err, WriteError::BodyAfterChunks));
        assert!(!written(w).contains("def"));
    }

    #[async_std::test]
    async fn failed_write_does_not_advance_state() {
        let mut w = ResponseWriter::new(BrokenPipe);
        w.write_status_line(200).await.unwrap();
        w.write_headers(&HeaderMap::new()).await.unwrap();
        let err = w.write_body(b"lost").await.unwrap_err();
        assert!(matches!(err, WriteError::Io(_)));
        assert_eq!(w.state(), WriterState::HeadersWritten);
    }

    #[test]
    fn default_headers_are_ordered() {
        let pairs: Vec<_> = default_headers(7)
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        assert_eq!(
            pairs,
            ["content-length=7", "connection=close", "content-type=text/plain"]
        );
    }
}
