//! Network Map Command

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use super::route::RouteDisplay;
use super::Context;
use crate::output::{print_list, OutputFormat, TableDisplay};
use meshplane_common::Peer;

#[derive(Args)]
pub struct NetmapArgs {
    /// Peer ID
    pub peer: String,
}

#[derive(Serialize)]
pub struct RemotePeerDisplay {
    pub name: String,
    pub ip: String,
    pub key: String,
}

impl From<Peer> for RemotePeerDisplay {
    fn from(peer: Peer) -> Self {
        Self {
            name: peer.name,
            ip: peer.ip.to_string(),
            key: peer.key,
        }
    }
}

impl TableDisplay for RemotePeerDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "IP", "Public Key"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.name.clone(), self.ip.clone(), self.key.clone()]
    }
}

#[derive(Serialize)]
struct NetmapDisplay {
    serial: u64,
    remote_peers: Vec<RemotePeerDisplay>,
    routes: Vec<RouteDisplay>,
}

pub fn execute(args: NetmapArgs, ctx: &Context) -> Result<()> {
    let map = ctx.manager.get_network_map(&args.peer)?;
    let display = NetmapDisplay {
        serial: map.serial,
        remote_peers: map.remote_peers.into_iter().map(RemotePeerDisplay::from).collect(),
        routes: map.routes.into_iter().map(RouteDisplay::from).collect(),
    };

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&display)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&display)?),
        format => {
            println!("{} {}", "Serial:".bold(), display.serial);
            println!();
            println!("{}", "Remote peers".bold());
            print_list(&display.remote_peers, format);
            println!();
            println!("{}", "Routes".bold());
            print_list(&display.routes, format);
        }
    }
    Ok(())
}
