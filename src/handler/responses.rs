use async_std::net::TcpStream;
use httpfromtcp::{HandlerError, HeaderMap, ResponseWriter, StatusCode, WriteError};

use crate::handler::Routes;

pub const HTML_200: &str = "<html>
  <head>
    <title>200 OK</title>
  </head>
  <body>
    <h1>Success!</h1>
    <p>Your request was an absolute banger.</p>
  </body>
</html>";

pub const HTML_400: &str = "<html>
  <head>
    <title>400 Bad Request</title>
  </head>
  <body>
    <h1>Bad Request</h1>
    <p>Your request honestly kinda sucked.</p>
  </body>
</html>";

pub const HTML_500: &str = "<html>
  <head>
    <title>500 Internal Server Error</title>
  </head>
  <body>
    <h1>Internal Server Error</h1>
    <p>Okay, you know what? This one is on me.</p>
  </body>
</html>";

const MAX_CHUNKS: usize = 100;

pub async fn html(
    w: &mut ResponseWriter<TcpStream>,
    routes: &Routes,
    status: StatusCode,
    body: &str,
) -> Result<(), WriteError> {
    w.write_status_line(status.as_u16()).await?;
    w.write_headers(&routes.headers("text/html")).await?;
    w.write_body(body.as_bytes()).await?;
    Ok(())
}

pub fn parse_chunk_count(raw: &str) -> Result<usize, HandlerError> {
    match raw.parse::<usize>() {
        Ok(n) if (1..=MAX_CHUNKS).contains(&n) => Ok(n),
        _ => Err(HandlerError::new(
            StatusCode::BadRequest,
            format!("chunk count must be between 1 and {MAX_CHUNKS}, got {raw:?}"),
        )),
    }
}

/// Streams `count` numbered lines as separate chunks, then reports the total
/// size in a trailer.
pub async fn chunked(
    w: &mut ResponseWriter<TcpStream>,
    routes: &Routes,
    count: usize,
) -> Result<(), WriteError> {
    let mut headers = routes.headers("text/plain");
    headers.set("transfer-encoding", "chunked");
    headers.set("trailer", "X-Content-Length");

    w.write_status_line(StatusCode::Ok.as_u16()).await?;
    w.write_headers(&headers).await?;

    let mut total = 0;
    for i in 0..count {
        let line = format!("chunk {i} of {count}\n");
        total += w.write_chunked_body(line.as_bytes()).await?;
    }

    let mut trailers = HeaderMap::new();
    trailers.set("X-Content-Length", &total.to_string());
    w.write_trailers(&trailers).await
}
