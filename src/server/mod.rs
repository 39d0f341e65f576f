//! Development server
//!
//! Two listeners: a byte-stream proxy in front of the project URL so the
//! site is reachable on a local port, and the reload channel serving the
//! livereload client plus its WebSocket. Body rewriting is deliberately
//! avoided; themes include `/livereload.js` while developing.

mod reload;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::{http::header, response::IntoResponse, routing::get, Router};
use colored::Colorize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};
use url::Url;

use crate::config::Profile;

pub use reload::{ReloadHandle, ReloadMessage};

/// Shared reload-app state
pub struct ServerState {
    /// Reload broadcast channel
    reload: ReloadHandle,

    /// Script served to browsers
    client_script: String,
}

/// Development server
pub struct DevServer {
    profile: Arc<Profile>,
}

impl DevServer {
    pub fn new(profile: Arc<Profile>) -> Self {
        Self { profile }
    }

    /// Bind both listeners, spawn their accept loops and return the reload
    /// handle. Startup is complete once this returns; the loops run for the
    /// rest of the process lifetime.
    pub async fn start(&self) -> Result<ReloadHandle> {
        let dev = &self.profile.dev;
        let (tx, _) = broadcast::channel::<ReloadMessage>(100);
        let handle = ReloadHandle::new(tx);

        let upstream = upstream_addr(&self.profile.project_url)?;
        let proxy_addr = format!("{}:{}", dev.host, dev.port);
        let reload_addr = format!("{}:{}", dev.host, dev.reload_port);

        // Reload channel app.
        let state = Arc::new(ServerState {
            reload: handle.clone(),
            client_script: reload::client_script(dev.reload_port),
        });
        let app = Router::new()
            .route("/livereload.js", get(serve_client_script))
            .route("/__reload", get(reload::reload_websocket))
            .layer(CorsLayer::permissive())
            .with_state(state);

        let reload_listener = TcpListener::bind(&reload_addr)
            .await
            .with_context(|| format!("Failed to bind reload channel on {reload_addr}"))?;
        info!("Reload channel on http://{}", reload_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(reload_listener, app).await {
                error!("Reload channel stopped: {e}");
            }
        });

        // Proxy listener.
        let proxy_listener = TcpListener::bind(&proxy_addr)
            .await
            .with_context(|| format!("Failed to bind proxy on {proxy_addr}"))?;
        info!("Proxying {} on http://{}", self.profile.project_url, proxy_addr);
        tokio::spawn(async move {
            loop {
                match proxy_listener.accept().await {
                    Ok((inbound, peer)) => {
                        debug!("Proxy connection from {peer}");
                        let upstream = upstream.clone();
                        tokio::spawn(async move {
                            if let Err(e) = proxy_connection(inbound, &upstream).await {
                                debug!("Proxy connection ended: {e}");
                            }
                        });
                    }
                    Err(e) => {
                        error!("Proxy accept failed: {e}");
                        break;
                    }
                }
            }
        });

        eprintln!(
            "  {} Serving {} at {}",
            "•".dimmed(),
            self.profile.project_url.cyan(),
            format!("http://{proxy_addr}").cyan().underline()
        );

        if dev.open {
            let address = format!("http://{proxy_addr}");
            if let Err(e) = open_browser(&address) {
                debug!("Failed to open browser: {e}");
            }
        }

        Ok(handle)
    }
}

/// Pump bytes between the browser and the upstream site
async fn proxy_connection(mut inbound: TcpStream, upstream: &str) -> Result<()> {
    let mut outbound = TcpStream::connect(upstream)
        .await
        .with_context(|| format!("Failed to reach upstream {upstream}"))?;
    tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await?;
    Ok(())
}

/// host:port of the configured project URL
fn upstream_addr(project_url: &str) -> Result<String> {
    let url = Url::parse(project_url)
        .with_context(|| format!("Invalid project URL: {project_url}"))?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("Project URL has no host: {project_url}"))?;
    let port = url.port_or_known_default().unwrap_or(80);
    Ok(format!("{host}:{port}"))
}

async fn serve_client_script(
    axum::extract::State(state): axum::extract::State<Arc<ServerState>>,
) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        state.client_script.clone(),
    )
}

/// Open URL in browser (simple implementation)
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()?;
    }

    Ok(())
}
