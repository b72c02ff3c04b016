//! Character-level checks shared by the request-line and header parsers.
//!
//! These functions only answer "is this well formed?"; turning a failed
//! check into a descriptive error is left to the callers in
//! [`headers`](crate::http::headers) and [`parser`](crate::http::parser).

use crate::http::HTTP_VERSION;

/// Returns `true` if `b` belongs to the RFC 7230 `tchar` set.
pub fn is_tchar(b: u8) -> bool {
    matches!(
        b,
        b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'%'
            | b'&'
            | b'\''
            | b'*'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~'
    )
}

/// A token is a non-empty run of `tchar`s.
pub fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_tchar)
}

/// Methods are restricted to uppercase ASCII letters.
pub fn is_valid_method(method: &str) -> bool {
    !method.is_empty() && method.bytes().all(|b| b.is_ascii_uppercase())
}

/// Extracts the version from an `HTTP/x.y` literal and checks it is the
/// only version this server speaks.
pub fn is_supported_version(version: &str) -> bool {
    version
        .strip_prefix("HTTP/")
        .is_some_and(|v| v == HTTP_VERSION)
}
