//! HTTP/1.1 served straight off a TCP socket.
//!
//! The [`http`] module holds the protocol pieces: an incremental request
//! parser and an ordered response writer. [`net`] drives them from a
//! concurrent accept loop, one task per connection and one request per
//! connection.

pub mod config;
pub mod http;
pub mod net;

pub use config::ServerConfig;
pub use http::headers::HeaderMap;
pub use http::request::{ParserState, Request, RequestLine};
pub use http::response::{ResponseWriter, WriteError, WriterState};
pub use http::status::StatusCode;
pub use net::server::{Handler, HandlerError, Server};
