mod handler;

use std::path::Path;
use std::sync::Arc;

use async_std::future;
use httpfromtcp::{Server, ServerConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG_PATH: &str = "httpfromtcp.toml";

#[async_std::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "httpfromtcp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::from_file(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            ServerConfig::from_file(DEFAULT_CONFIG_PATH)
        }
        None => ServerConfig::default(),
    };

    let routes = Arc::new(handler::Routes::new(&config));
    let server = Server::serve_with_config(
        move |stream, req| handler::route(routes.clone(), stream, req),
        config,
    )
    .await?;
    info!(local_addr = %server.local_addr(), "server started");

    // Runs until the process is killed; stopping on signals is left to
    // whoever supervises the process.
    future::pending::<()>().await;
    Ok(())
}
