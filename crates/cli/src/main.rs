//! Meshplane CLI - Main Entry Point
//!
//! Manages accounts, peers, groups, policies and routes directly against the
//! local state store, and inspects the network map each peer receives.

use clap::{Parser, Subcommand};
use meshplane_management::{AccountManager, ManagementConfig};
use std::path::PathBuf;

mod commands;
mod output;

use commands::{account, events, group, netmap, peer, policy, route, Context};

/// Meshplane - control plane for a WireGuard mesh overlay
#[derive(Parser)]
#[command(name = "meshplane")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "MESHPLANE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Store directory, overrides the configuration file
    #[arg(long, env = "MESHPLANE_STORE", global = true)]
    store: Option<PathBuf>,

    /// Account to operate on
    #[arg(long, env = "MESHPLANE_ACCOUNT", default_value = "default", global = true)]
    account: String,

    /// User performing the operation
    #[arg(long, env = "MESHPLANE_USER", default_value = "admin", global = true)]
    user: String,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage accounts
    #[command(subcommand)]
    Account(account::AccountCommands),

    /// Manage peers
    #[command(subcommand)]
    Peer(peer::PeerCommands),

    /// Manage groups
    #[command(subcommand)]
    Group(group::GroupCommands),

    /// Inspect access policies
    #[command(subcommand)]
    Policy(policy::PolicyCommands),

    /// Manage network routes
    #[command(subcommand)]
    Route(route::RouteCommands),

    /// Show the network map a peer receives
    Netmap(netmap::NetmapArgs),

    /// Show the audit trail
    Events(events::EventsArgs),

    /// Show version information
    Version,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(cli) {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Version = cli.command {
        println!("Meshplane CLI v{}", meshplane_common::VERSION);
        return Ok(());
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(meshplane_common::default_config_path);
    let mut config = ManagementConfig::load(&config_path)?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    tracing::debug!("Using store at {}", config.store_path.display());

    let ctx = Context {
        manager: AccountManager::from_config(&config)?,
        account: cli.account,
        user: cli.user,
        format: cli.format,
    };

    match cli.command {
        Commands::Account(cmd) => account::execute(cmd, &ctx),
        Commands::Peer(cmd) => peer::execute(cmd, &ctx),
        Commands::Group(cmd) => group::execute(cmd, &ctx),
        Commands::Policy(cmd) => policy::execute(cmd, &ctx),
        Commands::Route(cmd) => route::execute(cmd, &ctx),
        Commands::Netmap(args) => netmap::execute(args, &ctx),
        Commands::Events(args) => events::execute(args, &ctx),
        Commands::Version => Ok(()),
    }
}
