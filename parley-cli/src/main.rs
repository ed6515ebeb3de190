use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use parley::client::{
    ConnectionConfig, ConnectionState, NegotiatorConfig, RoomState, RouterHandle,
    RtcConnectionFactory, SessionSnapshot, SignalingRouter, WsTransport,
};
use parley::model::IceServerConfig;
use parley::{PeerId, SdpEncoding};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Join a signaling room and negotiate data-channel sessions with its peers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Join {
        /// Signaling relay, e.g. ws://localhost:3000/ws
        #[arg(long, env = "PARLEY_URL")]
        url: String,

        #[arg(long, env = "PARLEY_ROOM", default_value = "DEFAULT")]
        room: String,

        /// Requested local id; a random one is generated when omitted.
        #[arg(long)]
        peer_id: Option<String>,

        /// Peers to call explicitly once the room is joined.
        #[arg(long = "call")]
        calls: Vec<String>,

        #[arg(long, default_value_t = SdpEncoding::Base64)]
        sdp_encoding: SdpEncoding,

        #[arg(long = "stun")]
        stun_servers: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Commands::Join {
            url,
            room,
            peer_id,
            calls,
            sdp_encoding,
            stun_servers,
        } => {
            let mut config = NegotiatorConfig::new(room.as_str());
            config.peer_id = peer_id.map(PeerId::new);
            config.sdp_encoding = sdp_encoding;

            let connection_config = if stun_servers.is_empty() {
                ConnectionConfig::default()
            } else {
                ConnectionConfig {
                    ice_servers: stun_servers.into_iter().map(IceServerConfig::stun).collect(),
                }
            };

            join(&url, config, connection_config, calls).await
        }
    }
}

async fn join(
    url: &str,
    config: NegotiatorConfig,
    connection_config: ConnectionConfig,
    calls: Vec<String>,
) -> Result<()> {
    println!("{} {}", "🔌 Connecting to".cyan(), url);
    let (sink, transport_rx) = WsTransport::connect(url)
        .await
        .with_context(|| format!("Failed to connect to {url}"))?;

    let room = config.room_id.clone();
    let factory = Arc::new(RtcConnectionFactory::new(connection_config));
    let (router, handle) = SignalingRouter::new(config, Arc::new(sink), transport_rx, factory);
    let router_task = tokio::spawn(router.run());

    let status = handle
        .wait_for_room(|s| !matches!(s.state, RoomState::Idle | RoomState::Joining))
        .await?;
    if status.state == RoomState::Closed {
        anyhow::bail!("Signaling connection closed before the room was joined");
    }
    let local = status
        .local_peer_id
        .map(|p| p.to_string())
        .unwrap_or_default();
    println!(
        "{} {} as {}",
        "✅ Joined room".green().bold(),
        room.as_str().bold(),
        local.bold()
    );

    for peer in calls {
        match handle.call(peer.as_str()).await {
            Ok(()) => println!("{} {}", "📞 Calling".cyan(), peer),
            Err(e) => println!("{} {}: {}", "⚠️  Cannot call".yellow(), peer, e),
        }
    }

    watch_sessions(&handle).await;

    let ended = handle.end_all().await.unwrap_or(0);
    println!("{} {} session(s)", "👋 Ended".cyan(), ended);
    handle.shutdown().await.ok();
    router_task.await.context("Router task panicked")?;
    Ok(())
}

/// Prints session changes until Ctrl-C or until the signaling connection drops.
async fn watch_sessions(handle: &RouterHandle) {
    let mut updates = handle.sessions().subscribe();
    let closed = handle.wait_for_room(|s| s.state == RoomState::Closed);
    tokio::pin!(closed);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut closed => {
                println!("{}", "❌ Signaling connection closed".red());
                break;
            }
            update = updates.recv() => match update {
                Ok(snapshot) => print_snapshot(&snapshot),
                Err(RecvError::Lagged(n)) => tracing::warn!("Skipped {} session updates", n),
                Err(RecvError::Closed) => break,
            },
        }
    }
}

fn print_snapshot(s: &SessionSnapshot) {
    let state = match s.connection {
        ConnectionState::Connected => s.connection.to_string().green().bold(),
        ConnectionState::Failed => s.connection.to_string().red().bold(),
        ConnectionState::Disconnected | ConnectionState::Closed => {
            s.connection.to_string().yellow()
        }
        _ => s.connection.to_string().normal(),
    };
    let channel = if s.data_channel_open {
        "channel open".green()
    } else {
        "channel pending".dimmed()
    };
    println!(
        "  {} [{}] {} ({}, gen {})",
        s.peer_id.as_str().bold(),
        s.role,
        state,
        channel,
        s.generation
    );
}
