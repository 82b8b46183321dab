//! Group Commands

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use super::Context;
use crate::output::{print_item, print_list, print_success, TableDisplay};
use meshplane_common::Group;

#[derive(Subcommand)]
pub enum GroupCommands {
    /// Create a group
    Create {
        /// Group name
        #[arg(short, long)]
        name: String,

        /// Member peer ID (repeatable)
        #[arg(long = "peer")]
        peers: Vec<String>,
    },

    /// Add a peer to a group
    AddPeer {
        /// Group ID
        group: String,
        /// Peer ID
        peer: String,
    },

    /// Remove a peer from a group
    RemovePeer {
        /// Group ID
        group: String,
        /// Peer ID
        peer: String,
    },

    /// List groups
    List,

    /// Delete a group
    Delete {
        /// Group ID
        id: String,
    },
}

#[derive(Serialize)]
pub struct GroupDisplay {
    pub id: String,
    pub name: String,
    pub peers: Vec<String>,
}

impl From<Group> for GroupDisplay {
    fn from(group: Group) -> Self {
        Self {
            id: group.id,
            name: group.name,
            peers: group.peers,
        }
    }
}

impl TableDisplay for GroupDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Peers"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.id.clone(), self.name.clone(), self.peers.len().to_string()]
    }
}

pub fn execute(cmd: GroupCommands, ctx: &Context) -> Result<()> {
    match cmd {
        GroupCommands::Create { name, peers } => {
            let group = Group {
                id: String::new(),
                name,
                peers,
            };
            let group = ctx.manager.save_group(&ctx.account, &ctx.user, group)?;
            print_item(&GroupDisplay::from(group), ctx.format);
        }

        GroupCommands::AddPeer { group, peer } => {
            ctx.manager.group_add_peer(&ctx.account, &group, &peer, &ctx.user)?;
            print_success(&format!("Peer {} added to group {}", peer, group));
        }

        GroupCommands::RemovePeer { group, peer } => {
            ctx.manager.group_delete_peer(&ctx.account, &group, &peer, &ctx.user)?;
            print_success(&format!("Peer {} removed from group {}", peer, group));
        }

        GroupCommands::List => {
            let groups = ctx.manager.list_groups(&ctx.account, &ctx.user)?;
            let displays: Vec<GroupDisplay> = groups.into_iter().map(GroupDisplay::from).collect();
            print_list(&displays, ctx.format);
        }

        GroupCommands::Delete { id } => {
            ctx.manager.delete_group(&ctx.account, &id, &ctx.user)?;
            print_success(&format!("Group {} deleted", id));
        }
    }
    Ok(())
}
