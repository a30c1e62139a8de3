//! Camera agent configuration.
//!
//! Everything the agent needs is passed in at startup and threaded down
//! explicitly; there is no ambient global state.

use nestwatch_common::{Error, Result};
use nestwatch_core::DeviceIdentity;
use serde::{Deserialize, Serialize};
use url::Url;

/// One ICE server descriptor from the static list supplied at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// Capture settings handed to the media source.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
            width: 640,
            height: 480,
            framerate: 30,
        }
    }
}

/// Complete agent configuration, built once in `main`.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub identity: DeviceIdentity,
    pub relay_url: String,
    pub ice_servers: Vec<IceServer>,
    pub media: MediaConfig,
}

/// Normalize the relay endpoint: a bare `host:port` gets a `ws://`
/// scheme; `ws://` and `wss://` URLs pass through after validation.
pub fn relay_url(server: &str) -> Result<String> {
    let with_scheme = if server.contains("://") {
        server.to_string()
    } else {
        format!("ws://{server}")
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| Error::config(format!("invalid relay endpoint {server:?}: {e}")))?;
    match url.scheme() {
        "ws" | "wss" => Ok(url.to_string()),
        other => Err(Error::config(format!(
            "relay endpoint must be ws:// or wss://, got {other}://"
        ))),
    }
}

/// Parse the static ICE server list from its JSON form.
pub fn parse_ice_servers(raw: &str) -> Result<Vec<IceServer>> {
    serde_json::from_str(raw)
        .map_err(|e| Error::config(format!("invalid ICE server list: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_ws_scheme() {
        assert_eq!(relay_url("relay.example.com:8080").unwrap(), "ws://relay.example.com:8080/");
    }

    #[test]
    fn wss_url_passes_through() {
        assert_eq!(relay_url("wss://relay.example.com/ws").unwrap(), "wss://relay.example.com/ws");
    }

    #[test]
    fn http_scheme_is_rejected() {
        assert!(relay_url("http://relay.example.com").is_err());
    }

    #[test]
    fn parses_ice_server_list() {
        let servers = parse_ice_servers(
            r#"[
                {"urls": "stun:stun.l.google.com:19302"},
                {"urls": "turn:turn.example.com:3478", "username": "u", "credential": "c"}
            ]"#,
        )
        .unwrap();
        assert_eq!(servers.len(), 2);
        assert!(servers[0].username.is_none());
        assert_eq!(servers[1].credential.as_deref(), Some("c"));
    }

    #[test]
    fn rejects_malformed_ice_server_list() {
        assert!(parse_ice_servers("not json").is_err());
    }
}
