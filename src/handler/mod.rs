//! Demo routes served by the binary.

mod responses;
mod static_files;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use async_std::net::TcpStream;
use httpfromtcp::{HandlerError, HeaderMap, Request, ResponseWriter, StatusCode, WriteError};
use tracing::warn;

use crate::handler::responses::{HTML_200, HTML_400, HTML_500};

pub struct Routes {
    static_root: PathBuf,
    server_name: String,
}

impl Routes {
    pub fn new(config: &httpfromtcp::ServerConfig) -> Self {
        Self {
            static_root: PathBuf::from(&config.static_files_root),
            server_name: config.server_name.clone(),
        }
    }

    /// Headers every demo response starts from.
    fn headers(&self, content_type: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.set("content-type", content_type);
        h.set("date", &httpdate::fmt_http_date(SystemTime::now()));
        h.set("server", &self.server_name);
        h
    }
}

pub async fn route(routes: Arc<Routes>, stream: TcpStream, req: Request) -> Result<(), HandlerError> {
    let mut w = ResponseWriter::new(stream);
    let target = req.target();

    if let Some(count) = target.strip_prefix("/chunked/") {
        let count = responses::parse_chunk_count(count)?;
        return settle(responses::chunked(&mut w, &routes, count).await);
    }

    if let Some(name) = target.strip_prefix("/static/") {
        return settle(static_files::serve(&mut w, &routes, name).await);
    }

    let res = match target {
        "/yourproblem" => responses::html(&mut w, &routes, StatusCode::BadRequest, HTML_400).await,
        "/myproblem" => {
            responses::html(&mut w, &routes, StatusCode::InternalServerError, HTML_500).await
        }
        "/video" => static_files::serve(&mut w, &routes, "vim.mp4").await,
        _ => responses::html(&mut w, &routes, StatusCode::Ok, HTML_200).await,
    };
    settle(res)
}

/// A connection that failed mid-write cannot carry an error response, so
/// I/O failures are only logged.
fn settle(res: Result<(), WriteError>) -> Result<(), HandlerError> {
    match res {
        Err(WriteError::Io(err)) => {
            warn!(%err, "client went away mid-response");
            Ok(())
        }
        other => other.map_err(HandlerError::from),
    }
}
