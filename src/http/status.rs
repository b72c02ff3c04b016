use crate::http::response::WriteError;

/// Status codes this server knows how to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum StatusCode {
    Ok = 200,
    BadRequest = 400,
    InternalServerError = 500,
}

impl StatusCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn reason(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = WriteError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            200 => Ok(StatusCode::Ok),
            400 => Ok(StatusCode::BadRequest),
            500 => Ok(StatusCode::InternalServerError),
            _ => Err(WriteError::UnrecognizedStatus(code)),
        }
    }
}
