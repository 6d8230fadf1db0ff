//! Live-reload notifications over WebSocket.

use kiln_tasks::{Reload, ReloadSink};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Messages sent to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Full page reload
    Reload,

    /// Swap the listed assets in place
    Stream {
        /// Paths relative to the output root
        assets: Vec<String>,
    },

    /// Connection established
    Connected,
}

impl From<Reload> for ReloadMessage {
    fn from(reload: Reload) -> Self {
        match reload {
            Reload::Full => ReloadMessage::Reload,
            Reload::Stream { assets } => ReloadMessage::Stream { assets },
        }
    }
}

/// Hub for broadcasting reload messages to all connected clients.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: ReloadMessage) {
        // no receivers is fine
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    /// Number of connected clients.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadSink for ReloadHub {
    fn notify(&self, reload: Reload) {
        let msg = ReloadMessage::from(reload);
        tracing::debug!(clients = self.subscriber_count(), ?msg, "sending reload");
        self.send(msg);
    }
}

/// Generate the browser-side reload client.
///
/// Stylesheet streams swap matching `<link>` hrefs in place; anything the
/// page cannot patch falls back to a full reload.
pub fn reload_client_script(socket_path: &str) -> String {
    format!(
        r#"(function() {{
  'use strict';

  var attempts = 0;

  function swapStylesheets(assets) {{
    var links = Array.prototype.slice.call(document.querySelectorAll('link[rel="stylesheet"]'));
    var pending = assets.filter(function(asset) {{
      var matched = links.filter(function(link) {{
        var url = new URL(link.href, location.href);
        return url.pathname.slice(-asset.length - 1) === '/' + asset;
      }});
      matched.forEach(function(link) {{
        var url = new URL(link.href, location.href);
        url.searchParams.set('kiln', Date.now());
        link.href = url.toString();
      }});
      return matched.length === 0;
    }});
    return pending.length === 0;
  }}

  function connect() {{
    var scheme = location.protocol === 'https:' ? 'wss://' : 'ws://';
    var ws = new WebSocket(scheme + location.host + '{}');

    ws.onopen = function() {{
      attempts = 0;
    }};

    ws.onmessage = function(event) {{
      var msg = JSON.parse(event.data);
      switch (msg.type) {{
        case 'reload':
          location.reload();
          break;
        case 'stream':
          if (!swapStylesheets(msg.assets || [])) {{
            location.reload();
          }}
          break;
        case 'connected':
          console.log('[kiln] live reload connected');
          break;
      }}
    }};

    ws.onclose = function() {{
      if (attempts < 10) {{
        attempts++;
        setTimeout(connect, 1000 * attempts);
      }}
    }};
  }}

  connect();
}})();
"#,
        socket_path
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hub_broadcasts_notifications() {
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        hub.notify(Reload::Stream {
            assets: vec!["assets/main.css".into()],
        });
        hub.notify(Reload::Full);

        assert_eq!(
            rx.try_recv().unwrap(),
            ReloadMessage::Stream {
                assets: vec!["assets/main.css".into()]
            }
        );
        assert_eq!(rx.try_recv().unwrap(), ReloadMessage::Reload);
    }

    #[test]
    fn sending_without_clients_is_harmless() {
        let hub = ReloadHub::new();
        assert_eq!(hub.subscriber_count(), 0);
        hub.notify(Reload::Full);
    }

    #[test]
    fn serializes_wire_format() {
        let json = |msg: &ReloadMessage| serde_json::to_string(msg).unwrap();

        assert_eq!(json(&ReloadMessage::Reload), r#"{"type":"reload"}"#);
        assert_eq!(json(&ReloadMessage::Connected), r#"{"type":"connected"}"#);
        assert_eq!(
            json(&ReloadMessage::Stream {
                assets: vec!["assets/main.css".into()]
            }),
            r#"{"type":"stream","assets":["assets/main.css"]}"#
        );
    }

    #[test]
    fn client_targets_socket_path() {
        let script = reload_client_script("/__kiln/reload");
        assert!(script.contains("location.host + '/__kiln/reload'"));
    }
}
