//! Audit Trail Command

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::Context;
use crate::output::{format_timestamp, print_list, TableDisplay};
use meshplane_common::Event;

#[derive(Args)]
pub struct EventsArgs {
    /// Number of events to skip
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Maximum number of events to show
    #[arg(long, default_value_t = 100)]
    pub limit: usize,
}

#[derive(Serialize)]
pub struct EventDisplay {
    pub id: i64,
    pub timestamp: String,
    pub activity: String,
    pub message: String,
    pub initiator_id: String,
    pub target_id: String,
}

impl From<Event> for EventDisplay {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            timestamp: format_timestamp(event.timestamp),
            activity: event.activity.code().to_string(),
            message: event.activity.message().to_string(),
            initiator_id: event.initiator_id,
            target_id: event.target_id,
        }
    }
}

impl TableDisplay for EventDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Time", "Activity", "Initiator", "Target"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.timestamp.clone(),
            self.message.clone(),
            self.initiator_id.clone(),
            self.target_id.clone(),
        ]
    }
}

pub fn execute(args: EventsArgs, ctx: &Context) -> Result<()> {
    let events = ctx
        .manager
        .list_events(&ctx.account, &ctx.user, args.offset, args.limit)?;
    let displays: Vec<EventDisplay> = events.into_iter().map(EventDisplay::from).collect();
    print_list(&displays, ctx.format);
    Ok(())
}
