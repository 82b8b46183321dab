//! Peer Commands

use anyhow::{bail, Result};
use clap::Subcommand;
use serde::Serialize;

use super::Context;
use crate::output::{print_info, print_item, print_list, TableDisplay};
use meshplane_common::{Peer, WgKeyPair};

#[derive(Subcommand)]
pub enum PeerCommands {
    /// Register a peer
    Add {
        /// Peer name
        #[arg(short, long)]
        name: String,

        /// WireGuard public key (base64)
        #[arg(long, conflicts_with = "generate")]
        key: Option<String>,

        /// Generate a new key pair and print the private key
        #[arg(long)]
        generate: bool,
    },

    /// List peers
    List,
}

#[derive(Serialize)]
pub struct PeerDisplay {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub key: String,
}

impl From<Peer> for PeerDisplay {
    fn from(peer: Peer) -> Self {
        Self {
            id: peer.id,
            name: peer.name,
            ip: peer.ip.to_string(),
            key: peer.key,
        }
    }
}

impl TableDisplay for PeerDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "IP", "Public Key"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.ip.clone(),
            self.key.clone(),
        ]
    }
}

pub fn execute(cmd: PeerCommands, ctx: &Context) -> Result<()> {
    match cmd {
        PeerCommands::Add { name, key, generate } => {
            let key = match (key, generate) {
                (Some(key), _) => key,
                (None, true) => {
                    let pair = WgKeyPair::generate();
                    print_info(&format!("Private key: {}", pair.private_key_base64()));
                    pair.public_key_base64()
                }
                (None, false) => bail!("either --key or --generate is required"),
            };

            let peer = ctx.manager.add_peer(&ctx.account, &ctx.user, &key, &name)?;
            print_item(&PeerDisplay::from(peer), ctx.format);
        }

        PeerCommands::List => {
            let peers = ctx.manager.list_peers(&ctx.account, &ctx.user)?;
            let displays: Vec<PeerDisplay> = peers.into_iter().map(PeerDisplay::from).collect();
            print_list(&displays, ctx.format);
        }
    }
    Ok(())
}
