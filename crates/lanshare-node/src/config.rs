//! Node configuration loaded from environment variables.
//!
//! Command-line flags in the `lanshare` binary override these values.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use lanshare_shared::constants::{
    DEFAULT_DIRECTORY_PORT, DEFAULT_MAX_TRANSFERS, DEFAULT_RECEIVER_PORT,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use lanshare_transfer::{ReceiverConfig, SenderConfig};

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Unique display name of this peer.
    /// Env: `LANSHARE_PEER_NAME`
    /// Default: `HOSTNAME`, else `"peer"`
    pub peer_name: String,

    /// Base URL of the directory service.
    /// Env: `LANSHARE_DIRECTORY_URL`
    /// Default: `http://127.0.0.1:5000`
    pub directory_url: String,

    /// TCP port of the local receiver.
    /// Env: `LANSHARE_LISTEN_PORT`
    /// Default: `5001`
    pub listen_port: u16,

    /// Address published to the directory for other peers to dial.
    /// Env: `LANSHARE_ADVERTISE_ADDR`
    /// Default: detected LAN address, else `127.0.0.1`
    pub advertise_addr: IpAddr,

    /// Where received items are stored.
    /// Env: `LANSHARE_STORAGE_DIR`
    /// Default: `./received`
    pub storage_dir: PathBuf,

    /// Inbound transfers handled at once.
    /// Env: `LANSHARE_MAX_TRANSFERS`
    /// Default: `16`
    pub max_transfers: usize,

    /// Timeout for each directory request and for TCP connects to peers.
    /// Env: `LANSHARE_REQUEST_TIMEOUT_SECS`
    /// Default: `5`
    pub request_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            peer_name: std::env::var("HOSTNAME")
                .ok()
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| "peer".to_string()),
            directory_url: format!("http://127.0.0.1:{DEFAULT_DIRECTORY_PORT}"),
            listen_port: DEFAULT_RECEIVER_PORT,
            advertise_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            storage_dir: PathBuf::from("./received"),
            max_transfers: DEFAULT_MAX_TRANSFERS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl NodeConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("LANSHARE_PEER_NAME") {
            if !name.trim().is_empty() {
                config.peer_name = name;
            }
        }

        if let Ok(url) = std::env::var("LANSHARE_DIRECTORY_URL") {
            config.directory_url = url;
        }

        if let Some(port) = parsed_var("LANSHARE_LISTEN_PORT") {
            config.listen_port = port;
        }

        config.advertise_addr = parsed_var("LANSHARE_ADVERTISE_ADDR")
            .or_else(detect_local_ip)
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

        if let Ok(dir) = std::env::var("LANSHARE_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }

        if let Some(max) = parsed_var("LANSHARE_MAX_TRANSFERS") {
            config.max_transfers = max;
        }

        if let Some(secs) = parsed_var("LANSHARE_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }

        config
    }

    pub fn receiver_config(&self) -> ReceiverConfig {
        ReceiverConfig {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], self.listen_port)),
            storage_dir: self.storage_dir.clone(),
            max_concurrent: self.max_transfers,
            ..Default::default()
        }
    }

    pub fn sender_config(&self) -> SenderConfig {
        SenderConfig {
            connect_timeout: self.request_timeout,
            ..Default::default()
        }
    }
}

fn parsed_var<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = key, value = %raw, "Invalid value, using default");
            None
        }
    }
}

/// Address of the interface that routes outward. Connecting a UDP socket
/// sends nothing; it only selects a route.
pub fn detect_local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}
