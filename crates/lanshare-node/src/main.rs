//! # lanshare
//!
//! Peer node command line: run the receiver, send items to other peers,
//! and query the directory.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lanshare_node::{share, DirectoryClient, NodeConfig, Recipients};
use lanshare_transfer::{list_received, TransferReceiver, TransferSender};

#[derive(Parser, Debug)]
#[command(name = "lanshare", version, about = "Share files and folders with peers on the LAN")]
struct Cli {
    /// Display name of this peer
    #[arg(long, global = true)]
    name: Option<String>,

    /// Directory service URL
    #[arg(long, global = true)]
    directory: Option<String>,

    /// Receiver port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Address other peers should dial
    #[arg(long, global = true)]
    advertise: Option<IpAddr>,

    /// Where received items are stored
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register with the directory and receive until Ctrl+C
    Listen,
    /// Send a file or folder; `*` sends to every online peer
    Send {
        path: PathBuf,
        #[arg(required = true, num_args = 1..)]
        recipients: Vec<String>,
    },
    /// List peers known to the directory
    Peers {
        /// Include offline peers
        #[arg(long)]
        all: bool,
    },
    /// Show directory status
    Status,
    /// List items in the local storage directory
    Received,
}

impl Cli {
    fn config(&self) -> NodeConfig {
        let mut config = NodeConfig::from_env();
        if let Some(name) = &self.name {
            config.peer_name = name.clone();
        }
        if let Some(url) = &self.directory {
            config.directory_url = url.clone();
        }
        if let Some(port) = self.port {
            config.listen_port = port;
        }
        if let Some(addr) = self.advertise {
            config.advertise_addr = addr;
        }
        if let Some(dir) = &self.storage {
            config.storage_dir = dir.clone();
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config();
    let client = DirectoryClient::new(&config.directory_url, config.request_timeout)?;

    match cli.command {
        Command::Listen => listen(&config, &client).await?,
        Command::Send { path, recipients } => {
            let sender = TransferSender::new(config.sender_config());
            let report = share(
                &client,
                &sender,
                &config.peer_name,
                &path,
                &Recipients::from_args(&recipients),
            )
            .await?;

            for name in &report.skipped {
                println!("skipped   {name} (unknown or offline)");
            }
            for outcome in &report.outcomes {
                match &outcome.error {
                    None => println!("sent      {} ({} bytes)", outcome.recipient, outcome.bytes_sent),
                    Some(e) => println!("failed    {} ({e})", outcome.recipient),
                }
            }
            println!(
                "{}/{} delivered, file id {}",
                report.success_count(),
                report.outcomes.len(),
                report.file_id
            );
        }
        Command::Peers { all } => {
            let peers = client.list_peers(!all).await;
            if peers.is_empty() {
                println!("no peers (or directory unreachable)");
            }
            for peer in peers {
                println!("{:<20} {}:{:<6} {}", peer.name, peer.address, peer.port, peer.status);
            }
        }
        Command::Status => match client.status().await {
            Some(status) => println!(
                "{} v{}: {} peers, {} online ({})",
                status.status, status.version, status.peers_total, status.peers_online, status.timestamp
            ),
            None => println!("directory unreachable at {}", client.base_url()),
        },
        Command::Received => {
            let items = list_received(&config.storage_dir)?;
            if items.is_empty() {
                println!("nothing received in {}", config.storage_dir.display());
            }
            for item in items {
                let kind = if item.is_directory { "dir " } else { "file" };
                println!("{kind} {:>12}  {}", item.size, item.name);
            }
        }
    }

    Ok(())
}

async fn listen(config: &NodeConfig, client: &DirectoryClient) -> anyhow::Result<()> {
    let (notify_tx, mut notify_rx) = mpsc::channel(64);
    let receiver = TransferReceiver::bind(config.receiver_config(), notify_tx).await?;
    let port = receiver.local_addr()?.port();
    let handle = receiver.spawn()?;

    let address = config.advertise_addr.to_string();
    if client.register(&config.peer_name, &address, port).await.is_none() {
        warn!(directory = %client.base_url(), "Not registered; peers cannot find this node");
    }
    info!(peer = %config.peer_name, address = %address, port, "Listening. Press Ctrl+C to stop.");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            item = notify_rx.recv() => match item {
                Some(item) => {
                    let kind = if item.is_directory { "folder" } else { "file" };
                    println!(
                        "received {kind} {} from {} ({} bytes)",
                        item.display_name, item.sender_addr, item.size
                    );
                }
                None => break,
            },
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    client.unregister(&config.peer_name).await;
    handle.shutdown().await;
    Ok(())
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "info",
        1 => "debug,lanshare_node=debug,lanshare_transfer=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .init();
}
