//! hashchat terminal client.
//!
//! # Usage
//!
//! ```bash
//! # Join the room for a passphrase on a local relay
//! HASHCHAT_PHRASE='correct horse battery staple' hashchat
//!
//! # Explicit relay, name, and strict chain checking
//! hashchat --server wss://chat.example.org/ws --username ada --strict-chain
//! ```

use clap::Parser;
use hashchat_cli::{
    names,
    runtime::{Runtime, RuntimeConfig},
};
use hashchat_client::{Identity, SessionConfig, SystemEnv};
use hashchat_core::OrphanPolicy;
use hashchat_crypto::KdfParams;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// End-to-end encrypted group chat over a relay
#[derive(Parser, Debug)]
#[command(name = "hashchat")]
#[command(about = "End-to-end encrypted, hash-chained group chat")]
#[command(version)]
struct Args {
    /// Relay WebSocket URL
    #[arg(short, long, default_value = "ws://localhost:8080/ws")]
    server: String,

    /// Room passphrase; everyone with the same phrase shares a room
    #[arg(short, long, env = "HASHCHAT_PHRASE", hide_env_values = true)]
    phrase: String,

    /// Display name (derived from the client id when omitted)
    #[arg(short, long)]
    username: Option<String>,

    /// Reject messages that reference an unknown previous message
    #[arg(long)]
    strict_chain: bool,

    /// Upper bound on entries processed from one history replay
    #[arg(long, default_value = "10000")]
    max_history: usize,

    /// Argon2 memory cost in KiB
    #[arg(long, default_value = "19456")]
    kdf_memory_kib: u32,

    /// Argon2 iterations
    #[arg(long, default_value = "2")]
    kdf_iterations: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout carries the chat
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let client_id = names::generate_client_id(&SystemEnv::new());
    let username = args.username.unwrap_or_else(|| names::username_for(&client_id));
    tracing::info!(%client_id, %username, server = %args.server, "starting");

    let orphan_policy = if args.strict_chain { OrphanPolicy::Strict } else { OrphanPolicy::Lenient };
    let config = RuntimeConfig {
        server: args.server,
        phrase: args.phrase,
        identity: Identity::new(client_id, username),
        session: SessionConfig { orphan_policy, max_history_entries: args.max_history },
        kdf: KdfParams {
            memory_kib: args.kdf_memory_kib,
            iterations: args.kdf_iterations,
            ..KdfParams::default()
        },
    };

    let runtime = Runtime::connect(config).await?;
    runtime.run().await?;

    Ok(())
}
