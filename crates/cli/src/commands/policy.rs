//! Policy Commands

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use super::Context;
use crate::output::{print_list, TableDisplay};
use meshplane_common::Policy;

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// List policies
    List,
}

#[derive(Serialize)]
pub struct PolicyDisplay {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub rules: usize,
    pub description: String,
}

impl From<Policy> for PolicyDisplay {
    fn from(policy: Policy) -> Self {
        Self {
            id: policy.id,
            name: policy.name,
            enabled: policy.enabled,
            rules: policy.rules.len(),
            description: policy.description,
        }
    }
}

impl TableDisplay for PolicyDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Enabled", "Rules", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.enabled.to_string(),
            self.rules.to_string(),
            self.description.clone(),
        ]
    }
}

pub fn execute(cmd: PolicyCommands, ctx: &Context) -> Result<()> {
    match cmd {
        PolicyCommands::List => {
            let policies = ctx.manager.list_policies(&ctx.account, &ctx.user)?;
            let displays: Vec<PolicyDisplay> = policies.into_iter().map(PolicyDisplay::from).collect();
            print_list(&displays, ctx.format);
        }
    }
    Ok(())
}
