pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod status;
pub mod validator;

/// Line terminator used by every line of an HTTP/1.1 message head.
pub const CRLF: &str = "\r\n";

/// The only protocol version accepted in request lines and emitted in
/// status lines.
pub const HTTP_VERSION: &str = "1.1";
