//! Route Commands

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use super::Context;
use crate::output::{print_item, print_list, print_success, print_warning, short_id, TableDisplay};
use meshplane_common::route::MAX_METRIC;
use meshplane_common::Route;
use meshplane_management::{RouteUpdateKind, RouteUpdateOperation};

#[derive(Subcommand)]
pub enum RouteCommands {
    /// Create a route
    Create {
        /// Network prefix in CIDR notation (e.g., 192.168.0.0/16)
        #[arg(short, long)]
        network: String,

        /// Network identifier
        #[arg(long)]
        net_id: String,

        /// Routing peer ID
        #[arg(long, default_value = "")]
        peer: String,

        /// Peers group ID for high-availability routing
        #[arg(long, default_value = "")]
        peers_group: String,

        /// Distribution group ID (repeatable)
        #[arg(long = "group", required = true)]
        groups: Vec<String>,

        /// Description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Route metric, lower is preferred
        #[arg(long, default_value_t = MAX_METRIC)]
        metric: i64,

        /// Masquerade traffic leaving through the routing peer
        #[arg(long)]
        masquerade: bool,

        /// Create the route disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Get route details
    Get {
        /// Route ID
        id: String,
    },

    /// List routes
    List,

    /// Update fields of a route in one atomic batch
    Update(UpdateArgs),

    /// Delete a route
    Delete {
        /// Route ID
        id: String,
    },
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Route ID
    pub id: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub net_id: Option<String>,

    #[arg(long)]
    pub network: Option<String>,

    /// Routing peer ID, empty to clear
    #[arg(long)]
    pub peer: Option<String>,

    #[arg(long)]
    pub metric: Option<String>,

    #[arg(long)]
    pub masquerade: Option<String>,

    #[arg(long)]
    pub enabled: Option<String>,

    /// Replace the distribution groups with this group
    #[arg(long)]
    pub group: Option<String>,
}

impl UpdateArgs {
    fn operations(&self) -> Vec<RouteUpdateOperation> {
        [
            (RouteUpdateKind::Description, &self.description),
            (RouteUpdateKind::NetworkIdentifier, &self.net_id),
            (RouteUpdateKind::Network, &self.network),
            (RouteUpdateKind::Peer, &self.peer),
            (RouteUpdateKind::Metric, &self.metric),
            (RouteUpdateKind::Masquerade, &self.masquerade),
            (RouteUpdateKind::Enabled, &self.enabled),
            (RouteUpdateKind::Groups, &self.group),
        ]
        .into_iter()
        .filter_map(|(kind, value)| value.as_ref().map(|v| RouteUpdateOperation::new(kind, v)))
        .collect()
    }
}

#[derive(Serialize)]
pub struct RouteDisplay {
    pub id: String,
    pub net_id: String,
    pub network: String,
    pub network_type: String,
    pub peer: String,
    pub peers_group: String,
    pub metric: i64,
    pub masquerade: bool,
    pub enabled: bool,
    pub groups: Vec<String>,
    pub description: String,
}

impl From<Route> for RouteDisplay {
    fn from(route: Route) -> Self {
        Self {
            network: route.network.to_string(),
            network_type: route.network_type().to_string(),
            peer: route.peer().to_string(),
            peers_group: route.peers_group().to_string(),
            id: route.id,
            net_id: route.net_id,
            metric: route.metric,
            masquerade: route.masquerade,
            enabled: route.enabled,
            groups: route.groups,
            description: route.description,
        }
    }
}

impl TableDisplay for RouteDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Net ID", "Network", "Egress", "Metric", "Masquerade", "Enabled", "Groups"]
    }

    fn row(&self) -> Vec<String> {
        let egress = if !self.peer.is_empty() {
            format!("peer {}", short_id(&self.peer))
        } else if !self.peers_group.is_empty() {
            format!("group {}", short_id(&self.peers_group))
        } else {
            "-".to_string()
        };

        vec![
            self.id.clone(),
            self.net_id.clone(),
            self.network.clone(),
            egress,
            self.metric.to_string(),
            self.masquerade.to_string(),
            self.enabled.to_string(),
            self.groups.iter().map(|g| short_id(g)).collect::<Vec<_>>().join(", "),
        ]
    }
}

pub fn execute(cmd: RouteCommands, ctx: &Context) -> Result<()> {
    match cmd {
        RouteCommands::Create {
            network,
            net_id,
            peer,
            peers_group,
            groups,
            description,
            metric,
            masquerade,
            disabled,
        } => {
            let route = ctx.manager.create_route(
                &ctx.account,
                &network,
                &peer,
                &peers_group,
                &description,
                &net_id,
                masquerade,
                metric,
                &groups,
                !disabled,
                &ctx.user,
            )?;
            print_item(&RouteDisplay::from(route), ctx.format);
        }

        RouteCommands::Get { id } => {
            let route = ctx.manager.get_route(&ctx.account, &id, &ctx.user)?;
            print_item(&RouteDisplay::from(route), ctx.format);
        }

        RouteCommands::List => {
            let routes = ctx.manager.list_routes(&ctx.account, &ctx.user)?;
            let displays: Vec<RouteDisplay> = routes.into_iter().map(RouteDisplay::from).collect();
            print_list(&displays, ctx.format);
        }

        RouteCommands::Update(args) => {
            let operations = args.operations();
            if operations.is_empty() {
                print_warning("No fields given, nothing to update");
                return Ok(());
            }
            let route = ctx.manager.update_route(&ctx.account, &args.id, &operations, &ctx.user)?;
            print_item(&RouteDisplay::from(route), ctx.format);
        }

        RouteCommands::Delete { id } => {
            ctx.manager.delete_route(&ctx.account, &id, &ctx.user)?;
            print_success(&format!("Route {} deleted", id));
        }
    }
    Ok(())
}
