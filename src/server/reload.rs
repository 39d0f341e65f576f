//! Live-reload channel
//!
//! Tasks publish typed reload messages over a broadcast channel; connected
//! browsers receive them as JSON over a WebSocket. Style updates are
//! injected (stylesheet href swap) without a full page reload.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::ServerState;

/// Reload message types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReloadMessage {
    /// Connection established
    Connected,

    /// Full page reload required
    FullReload { reason: String },

    /// Stylesheet updated (inject without reloading)
    CssUpdate { path: String },

    /// A task failed; shown in the browser console
    BuildError { message: String },
}

/// Cloneable sender half handed to tasks and the watch orchestrator
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    tx: broadcast::Sender<ReloadMessage>,
}

impl ReloadHandle {
    pub fn new(tx: broadcast::Sender<ReloadMessage>) -> Self {
        Self { tx }
    }

    pub fn css_update(&self, path: &str) {
        let _ = self.tx.send(ReloadMessage::CssUpdate {
            path: path.to_string(),
        });
    }

    pub fn full_reload(&self, reason: &str) {
        let _ = self.tx.send(ReloadMessage::FullReload {
            reason: reason.to_string(),
        });
    }

    pub fn build_error(&self, message: &str) {
        let _ = self.tx.send(ReloadMessage::BuildError {
            message: message.to_string(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.tx.subscribe()
    }
}

/// Handle WebSocket upgrade for the reload channel
pub async fn reload_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_reload_socket(socket, state))
}

/// Forward broadcast messages to one connected client
async fn handle_reload_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut reload_rx = state.reload.subscribe();

    if let Ok(json) = serde_json::to_string(&ReloadMessage::Connected) {
        let _ = sender.send(Message::Text(json)).await;
    }

    debug!("Reload client connected");

    let send_task = tokio::spawn(async move {
        while let Ok(message) = reload_rx.recv().await {
            if let Ok(json) = serde_json::to_string(&message) {
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Close(_) => {
                    debug!("Reload client disconnected");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    debug!("Reload connection closed");
}

/// Client script served at `/livereload.js`; themes include it while
/// developing. Swaps stylesheet hrefs on `css-update`, reloads otherwise.
pub fn client_script(reload_port: u16) -> String {
    format!(
        r#"// Themekit reload client
(function() {{
  var ws = new WebSocket('ws://' + location.hostname + ':{reload_port}/__reload');

  ws.onmessage = function(event) {{
    var message = JSON.parse(event.data);

    switch (message.type) {{
      case 'full-reload':
        console.log('[themekit] Full reload:', message.reason);
        location.reload();
        break;

      case 'css-update':
        console.log('[themekit] CSS update:', message.path);
        var links = document.querySelectorAll('link[rel="stylesheet"]');
        links.forEach(function(link) {{
          var url = new URL(link.href);
          url.searchParams.set('t', Date.now());
          link.href = url.toString();
        }});
        break;

      case 'build-error':
        console.error('[themekit] Build error:', message.message);
        break;

      case 'connected':
        console.log('[themekit] Reload channel connected');
        break;
    }}
  }};

  ws.onclose = function() {{
    console.log('[themekit] Reload channel lost, retrying...');
    setTimeout(function() {{ location.reload(); }}, 1000);
  }};
}})();
"#
    )
}
