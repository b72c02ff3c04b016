//! Core HTTP server implementation.
//!
//! This module implements the low-level HTTP server runtime.
//! It is responsible only for networking concerns such as:
//! - accepting TCP connections,
//! - reading raw bytes from the network,
//! - writing raw bytes back to the client.
//!
//! Request parsing is delegated to [`Request::from_reader_with`] and
//! response emission to [`ResponseWriter`]. What to answer is decided by the
//! user supplied [`Handler`].
//!
//! ## Request handling flow
//!
//! 1. Accept a TCP connection and spawn a task for it
//! 2. Incrementally parse the bytes read into a [`Request`]
//! 3. Hand the request and a clone of the connection to the handler
//! 4. Render a [`HandlerError`] (or a `400` for a parse failure) if needed
//! 5. Shut the connection down
//!
//! Exactly one request is served per connection.

use std::future::Future;
use std::io;
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_std::channel::{self, Receiver, Sender};
use async_std::io::Write;
use async_std::net::{TcpListener, TcpStream};
use async_std::task::{self, JoinHandle};
use futures_util::future::{Either, select};
use futures_util::pin_mut;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::config::ServerConfig;
use crate::http::request::Request;
use crate::http::response::{ResponseWriter, WriteError, default_headers};
use crate::http::status::StatusCode;

/// A failure the handler wants the server to report to the client.
#[derive(Debug, Error)]
#[error("{} {}: {message}", .status.as_u16(), .status.reason())]
pub struct HandlerError {
    pub status: StatusCode,
    pub message: String,
}

impl HandlerError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Renders the error as a complete `text/plain` response on `sink`.
    pub async fn write_to<W>(&self, sink: W) -> Result<(), WriteError>
    where
        W: Write + Unpin,
    {
        let body = self.message.as_bytes();
        let mut w = ResponseWriter::new(sink);
        w.write_status_line(self.status.as_u16()).await?;
        w.write_headers(&default_headers(body.len())).await?;
        w.write_body(body).await?;
        Ok(())
    }
}

impl From<WriteError> for HandlerError {
    fn from(err: WriteError) -> Self {
        HandlerError::new(StatusCode::InternalServerError, err.to_string())
    }
}

/// Serves one parsed request.
///
/// The handler receives its own handle on the connection to write the
/// response to. Returning `Ok(())` means a complete response was written;
/// returning a [`HandlerError`] asks the server to write one instead.
pub trait Handler: Send + Sync + 'static {
    type Future: Future<Output = Result<(), HandlerError>> + Send + 'static;

    fn call(&self, stream: TcpStream, req: Request) -> Self::Future;
}

impl<F, Fut> Handler for F
where
    F: Fn(TcpStream, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    type Future = Fut;

    fn call(&self, stream: TcpStream, req: Request) -> Fut {
        self(stream, req)
    }
}

/// Handle on a running server. Dropping it stops accepting new connections.
pub struct Server {
    local_addr: SocketAddr,
    closed: Arc<AtomicBool>,
    shutdown: Sender<()>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl Server {
    /// Starts serving on `port` of the default address.
    pub async fn serve<H: Handler>(handler: H, port: u16) -> io::Result<Server> {
        let config = ServerConfig {
            port,
            ..ServerConfig::default()
        };
        Self::serve_with_config(handler, config).await
    }

    /// Binds the configured address and starts the accept loop in the
    /// background. Returns as soon as the socket is listening.
    pub async fn serve_with_config<H: Handler>(
        handler: H,
        config: ServerConfig,
    ) -> io::Result<Server> {
        let listener = TcpListener::bind((config.address, config.port)).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "listening");

        let closed = Arc::new(AtomicBool::new(false));
        let (shutdown, stop) = channel::bounded(1);
        let accept_task = task::spawn(Self::accept_loop(
            listener,
            stop,
            closed.clone(),
            Arc::new(handler),
            Arc::new(config),
        ));

        Ok(Server {
            local_addr,
            closed,
            shutdown,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops accepting connections and waits until the listener is closed.
    ///
    /// Only the first call does anything. Connections already being handled
    /// run to completion.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.shutdown.close();
        let accept_task = self
            .accept_task
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(accept_task) = accept_task {
            accept_task.await;
        }
        info!(local_addr = %self.local_addr, "server closed");
    }

    async fn accept_loop<H: Handler>(
        listener: TcpListener,
        stop: Receiver<()>,
        closed: Arc<AtomicBool>,
        handler: Arc<H>,
        config: Arc<ServerConfig>,
    ) {
        loop {
            let accept = listener.accept();
            let stopped = stop.recv();
            pin_mut!(accept, stopped);

            match select(accept, stopped).await {
                Either::Left((Ok((stream, peer)), _)) => {
                    trace!(%peer, "accepted connection");
                    task::spawn(Self::handle_client(
                        stream,
                        handler.clone(),
                        config.clone(),
                    ));
                }
                Either::Left((Err(err), _)) => {
                    if closed.load(Ordering::SeqCst) {
                        break;
                    }
                    warn!(%err, "failed to accept connection");
                }
                Either::Right(_) => break,
            }
        }
    }

    /// Handles a single client connection from the first byte to shutdown.
    async fn handle_client<H: Handler>(
        stream: TcpStream,
        handler: Arc<H>,
        config: Arc<ServerConfig>,
    ) {
        let peer = stream.peer_addr().ok();

        let failure = match Request::from_reader_with(
            &stream,
            config.buffer_size,
            config.active_read_timeout(),
        )
        .await
        {
            Ok(req) => {
                debug!(
                    ?peer,
                    method = req.method(),
                    target = req.target(),
                    "handling request"
                );
                handler.call(stream.clone(), req).await.err()
            }
            Err(err) => {
                debug!(?peer, %err, "failed to read request");
                Some(HandlerError::new(StatusCode::BadRequest, err.to_string()))
            }
        };

        if let Some(failure) = failure {
            debug!(?peer, status = failure.status.as_u16(), "writing error response");
            if let Err(err) = failure.write_to(&stream).await {
                debug!(?peer, %err, "failed to write error response");
            }
        }

        if let Err(err) = stream.shutdown(Shutdown::Both) {
            trace!(?peer, %err, "connection already shut down");
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shutdown.close();
        }
    }
}
