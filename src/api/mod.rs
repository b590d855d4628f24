pub mod routes;
pub mod views;

use crate::config::Config;
use crate::forms::FormController;
use anyhow::{Context, Result};
use axum::Router;
use rust_embed::RustEmbed;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(RustEmbed)]
#[folder = "assets/static"]
struct StaticAssets;

pub async fn run_server(config: Arc<Config>) -> Result<()> {
    let ip: IpAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.bind_address))?;
    let addr = SocketAddr::from((ip, config.api_port));

    let state = routes::AppState {
        controller: FormController::from_config(Arc::clone(&config)),
    };
    let app: Router = routes::router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind form server: {addr}"))?;

    info!(address = %addr, spreadsheet = %config.spreadsheet_name, "FieldReport form server started");

    axum::serve(listener, app)
        .await
        .context("Form server failed")?;

    Ok(())
}

pub fn get_embedded_asset(path: &str) -> Option<(Vec<u8>, String)> {
    let requested = path.trim_start_matches('/');

    StaticAssets::get(requested).map(|content| {
        let mime = mime_guess::from_path(requested)
            .first_or_octet_stream()
            .to_string();
        (content.data.into_owned(), mime)
    })
}
