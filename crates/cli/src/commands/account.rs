//! Account Commands

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use super::Context;
use crate::output::{format_timestamp, print_item, TableDisplay};
use meshplane_common::Account;

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create the account named by --account, with --user as its administrator
    Create {
        /// DNS domain of the account
        #[arg(long, default_value = "")]
        domain: String,
    },
}

#[derive(Serialize)]
pub struct AccountDisplay {
    pub id: String,
    pub domain: String,
    pub created_by: String,
    pub created_at: String,
    pub serial: u64,
}

impl From<Account> for AccountDisplay {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            domain: account.domain,
            created_by: account.created_by,
            created_at: format_timestamp(account.created_at),
            serial: account.serial,
        }
    }
}

impl TableDisplay for AccountDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Domain", "Created By", "Created", "Serial"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.domain.clone(),
            self.created_by.clone(),
            self.created_at.clone(),
            self.serial.to_string(),
        ]
    }
}

pub fn execute(cmd: AccountCommands, ctx: &Context) -> Result<()> {
    match cmd {
        AccountCommands::Create { domain } => {
            let account = ctx.manager.create_account(&ctx.account, &ctx.user, &domain)?;
            print_item(&AccountDisplay::from(account), ctx.format);
        }
    }
    Ok(())
}
