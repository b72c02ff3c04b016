use std::path::{Component, Path, PathBuf};

use async_std::net::TcpStream;
use httpfromtcp::{ResponseWriter, StatusCode, WriteError};
use tracing::{debug, warn};

use crate::handler::responses::{self, HTML_500};
use crate::handler::Routes;

pub async fn serve(
    w: &mut ResponseWriter<TcpStream>,
    routes: &Routes,
    name: &str,
) -> Result<(), WriteError> {
    let Some(relative) = sanitize_path(name) else {
        debug!(name, "refusing path outside the static root");
        return responses::html(w, routes, StatusCode::BadRequest, responses::HTML_400).await;
    };

    let full_path = routes.static_root.join(relative);
    debug!(path = %full_path.display(), "serving static file");

    let body = match async_std::fs::read(&full_path).await {
        Ok(body) => body,
        Err(err) => {
            warn!(path = %full_path.display(), %err, "failed to read static file");
            return responses::html(w, routes, StatusCode::InternalServerError, HTML_500).await;
        }
    };

    w.write_status_line(StatusCode::Ok.as_u16()).await?;
    w.write_headers(&routes.headers(guess_mime(&full_path))).await?;
    w.write_body(&body).await?;
    Ok(())
}

/// Keeps only plain path components, so the result stays under the root.
fn sanitize_path(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!clean.as_os_str().is_empty()).then_some(clean)
}

fn guess_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("htm") | Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}
