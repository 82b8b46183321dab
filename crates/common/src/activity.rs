//! Audit trail of account changes

use crate::db::Database;
use crate::{Error, Result};
use parking_lot::Mutex;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Kind of change recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    AccountCreated,
    PeerAddedByUser,
    UserCreated,
    GroupCreated,
    GroupUpdated,
    GroupDeleted,
    PeerAddedToGroup,
    PeerRemovedFromGroup,
    PolicyAdded,
    PolicyUpdated,
    PolicyRemoved,
    RouteCreated,
    RouteUpdated,
    RouteRemoved,
}

impl Activity {
    pub fn code(self) -> &'static str {
        match self {
            Activity::AccountCreated => "account.create",
            Activity::PeerAddedByUser => "user.peer.add",
            Activity::UserCreated => "user.create",
            Activity::GroupCreated => "group.add",
            Activity::GroupUpdated => "group.update",
            Activity::GroupDeleted => "group.delete",
            Activity::PeerAddedToGroup => "group.peer.add",
            Activity::PeerRemovedFromGroup => "group.peer.delete",
            Activity::PolicyAdded => "policy.add",
            Activity::PolicyUpdated => "policy.update",
            Activity::PolicyRemoved => "policy.delete",
            Activity::RouteCreated => "route.add",
            Activity::RouteUpdated => "route.update",
            Activity::RouteRemoved => "route.delete",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Activity::AccountCreated => "Account created",
            Activity::PeerAddedByUser => "Peer added",
            Activity::UserCreated => "User created",
            Activity::GroupCreated => "Group created",
            Activity::GroupUpdated => "Group updated",
            Activity::GroupDeleted => "Group deleted",
            Activity::PeerAddedToGroup => "Peer added to group",
            Activity::PeerRemovedFromGroup => "Peer removed from group",
            Activity::PolicyAdded => "Policy added",
            Activity::PolicyUpdated => "Policy updated",
            Activity::PolicyRemoved => "Policy deleted",
            Activity::RouteCreated => "Route created",
            Activity::RouteUpdated => "Route updated",
            Activity::RouteRemoved => "Route deleted",
        }
    }
}

impl std::fmt::Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Activity {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        const ALL: [Activity; 14] = [
            Activity::AccountCreated,
            Activity::PeerAddedByUser,
            Activity::UserCreated,
            Activity::GroupCreated,
            Activity::GroupUpdated,
            Activity::GroupDeleted,
            Activity::PeerAddedToGroup,
            Activity::PeerRemovedFromGroup,
            Activity::PolicyAdded,
            Activity::PolicyUpdated,
            Activity::PolicyRemoved,
            Activity::RouteCreated,
            Activity::RouteUpdated,
            Activity::RouteRemoved,
        ];
        ALL.into_iter()
            .find(|a| a.code() == s)
            .ok_or_else(|| Error::Internal(format!("unknown activity code: {}", s)))
    }
}

/// Single audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Assigned by the store; 0 until saved
    #[serde(default)]
    pub id: i64,
    pub timestamp: i64,
    pub activity: Activity,
    /// Who made the change
    pub initiator_id: String,
    /// What was changed
    pub target_id: String,
    pub account_id: String,
    #[serde(default)]
    pub meta: HashMap<String, serde_json::Value>,
}

impl Event {
    pub fn new(
        activity: Activity,
        initiator_id: impl Into<String>,
        target_id: impl Into<String>,
        account_id: impl Into<String>,
        meta: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: 0,
            timestamp: chrono::Utc::now().timestamp(),
            activity,
            initiator_id: initiator_id.into(),
            target_id: target_id.into(),
            account_id: account_id.into(),
            meta,
        }
    }
}

/// Durable append-only audit log
pub trait EventStore: Send + Sync {
    fn save(&self, event: Event) -> Result<Event>;

    /// Events of an account, oldest first, paginated
    fn get(&self, account_id: &str, offset: usize, limit: usize) -> Result<Vec<Event>>;
}

/// Event store backed by the shared state database
#[derive(Clone)]
pub struct SqliteEventStore {
    db: Database,
}

impl SqliteEventStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl EventStore for SqliteEventStore {
    fn save(&self, mut event: Event) -> Result<Event> {
        let conn = self.db.connection();
        let conn = conn.lock();
        conn.execute(
            "INSERT INTO events (timestamp, activity, initiator_id, target_id, account_id, meta)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.timestamp,
                event.activity.code(),
                event.initiator_id,
                event.target_id,
                event.account_id,
                serde_json::to_string(&event.meta)?,
            ],
        )?;
        event.id = conn.last_insert_rowid();
        Ok(event)
    }

    fn get(&self, account_id: &str, offset: usize, limit: usize) -> Result<Vec<Event>> {
        let conn = self.db.connection();
        let conn = conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, activity, initiator_id, target_id, account_id, meta
             FROM events WHERE account_id = ?1 ORDER BY id ASC LIMIT ?2 OFFSET ?3",
        )?;

        let rows = stmt.query_map(params![account_id, limit as i64, offset as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp, activity, initiator_id, target_id, account_id, meta) = row?;
            events.push(Event {
                id,
                timestamp,
                activity: activity.parse()?,
                initiator_id,
                target_id,
                account_id,
                meta: serde_json::from_str(&meta)?,
            });
        }
        Ok(events)
    }
}

/// Event store kept in memory, for tests and ephemeral setups
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<Mutex<Vec<Event>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored event, in insertion order
    pub fn all(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

impl EventStore for InMemoryEventStore {
    fn save(&self, mut event: Event) -> Result<Event> {
        let mut events = self.events.lock();
        event.id = events.len() as i64 + 1;
        events.push(event.clone());
        Ok(event)
    }

    fn get(&self, account_id: &str, offset: usize, limit: usize) -> Result<Vec<Event>> {
        Ok(self
            .events
            .lock()
            .iter()
            .filter(|e| e.account_id == account_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(account: &str, activity: Activity) -> Event {
        Event::new(
            activity,
            "admin",
            "route-1",
            account,
            HashMap::from([("name".to_string(), "office".into())]),
        )
    }

    #[test]
    fn test_sqlite_event_store() {
        let store = SqliteEventStore::new(Database::open_memory().unwrap());
        let saved = store.save(sample("acc", Activity::RouteCreated)).unwrap();
        assert!(saved.id > 0);
        store.save(sample("acc", Activity::RouteRemoved)).unwrap();
        store.save(sample("other", Activity::RouteCreated)).unwrap();

        let events = store.get("acc", 0, 10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].activity, Activity::RouteCreated);
        assert_eq!(events[1].activity, Activity::RouteRemoved);
        assert_eq!(events[0].meta["name"], "office");

        assert_eq!(store.get("acc", 1, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_activity_codes_parse_back() {
        for activity in [Activity::RouteCreated, Activity::PeerRemovedFromGroup, Activity::PolicyAdded] {
            assert_eq!(activity.code().parse::<Activity>().unwrap(), activity);
        }
        assert!("nope".parse::<Activity>().is_err());
    }
}
