//! Group operations

use super::AccountManager;
use meshplane_common::{new_id, Account, Activity, Error, Group, Result, GROUP_ALL};
use std::collections::HashMap;
use tracing::info;

impl AccountManager {
    /// Create a group, or replace it when `group.id` names an existing one
    pub fn save_group(&self, account_id: &str, user_id: &str, mut group: Group) -> Result<Group> {
        let _lock = self.locks.acquire(account_id);
        let mut account = self.store.get_account(account_id)?;
        account.find_user(user_id)?;

        if group.name.is_empty() {
            return Err(Error::invalid_argument("group name should not be empty"));
        }
        for peer_id in &group.peers {
            if account.get_peer(peer_id).is_none() {
                return Err(Error::invalid_argument(format!("peer with ID {} not found", peer_id)));
            }
        }
        group.peers.sort();
        group.peers.dedup();

        let all_id = account.get_group_all()?.id.clone();
        if group.id == all_id || (group.name == GROUP_ALL && group.id != all_id) {
            return Err(Error::invalid_argument(format!(
                "group {} is managed by the system",
                GROUP_ALL
            )));
        }

        let activity = if group.id.is_empty() || !account.groups.contains_key(&group.id) {
            if group.id.is_empty() {
                group.id = new_id();
            }
            Activity::GroupCreated
        } else {
            Activity::GroupUpdated
        };
        account.groups.insert(group.id.clone(), group.clone());

        self.persist(&mut account)?;
        info!("Saved group {} ({}) in account {}", group.name, group.id, account_id);

        let pushed = self.push(&account, "group", &group.id);
        self.store_event(user_id, &group.id, account_id, activity, group_meta(&group));
        pushed?;
        Ok(group)
    }

    pub fn get_group(&self, account_id: &str, group_id: &str, user_id: &str) -> Result<Group> {
        let _lock = self.locks.acquire(account_id);
        let account = self.store.get_account(account_id)?;
        account.find_user(user_id)?;

        account
            .groups
            .get(group_id)
            .cloned()
            .ok_or_else(|| Error::not_found("group", group_id))
    }

    /// Groups of the account, ordered by name
    pub fn list_groups(&self, account_id: &str, user_id: &str) -> Result<Vec<Group>> {
        let _lock = self.locks.acquire(account_id);
        let account = self.store.get_account(account_id)?;
        account.find_user(user_id)?;

        let mut groups: Vec<Group> = account.groups.into_values().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(groups)
    }

    pub fn group_add_peer(&self, account_id: &str, group_id: &str, peer_id: &str, user_id: &str) -> Result<()> {
        let _lock = self.locks.acquire(account_id);
        let mut account = self.store.get_account(account_id)?;
        account.find_user(user_id)?;

        if account.get_peer(peer_id).is_none() {
            return Err(Error::not_found("peer", peer_id));
        }
        let group = account
            .groups
            .get_mut(group_id)
            .ok_or_else(|| Error::not_found("group", group_id))?;
        if group.contains(peer_id) {
            return Ok(());
        }
        group.peers.push(peer_id.to_string());
        let meta = group_meta(group);

        self.persist(&mut account)?;
        info!("Added peer {} to group {} in account {}", peer_id, group_id, account_id);

        let pushed = self.push(&account, "group", group_id);
        self.store_event(user_id, peer_id, account_id, Activity::PeerAddedToGroup, meta);
        pushed
    }

    pub fn group_delete_peer(&self, account_id: &str, group_id: &str, peer_id: &str, user_id: &str) -> Result<()> {
        let _lock = self.locks.acquire(account_id);
        let mut account = self.store.get_account(account_id)?;
        account.find_user(user_id)?;

        let group = account
            .groups
            .get_mut(group_id)
            .ok_or_else(|| Error::not_found("group", group_id))?;
        if group.name == GROUP_ALL {
            return Err(Error::invalid_argument(format!(
                "peers can't be removed from group {}",
                GROUP_ALL
            )));
        }
        let before = group.peers.len();
        group.peers.retain(|p| p != peer_id);
        if group.peers.len() == before {
            return Err(Error::not_found("peer", peer_id));
        }
        let meta = group_meta(group);

        self.persist(&mut account)?;
        info!("Removed peer {} from group {} in account {}", peer_id, group_id, account_id);

        let pushed = self.push(&account, "group", group_id);
        self.store_event(user_id, peer_id, account_id, Activity::PeerRemovedFromGroup, meta);
        pushed
    }

    /// Delete a group that no route or policy references
    pub fn delete_group(&self, account_id: &str, group_id: &str, user_id: &str) -> Result<()> {
        let _lock = self.locks.acquire(account_id);
        let mut account = self.store.get_account(account_id)?;
        account.find_user(user_id)?;

        let group = account
            .get_group(group_id)
            .ok_or_else(|| Error::not_found("group", group_id))?;
        if group.name == GROUP_ALL {
            return Err(Error::invalid_argument(format!(
                "deleting group {} is not allowed",
                GROUP_ALL
            )));
        }
        check_group_unlinked(&account, group_id)?;

        let group = account
            .groups
            .remove(group_id)
            .ok_or_else(|| Error::not_found("group", group_id))?;

        self.persist(&mut account)?;
        info!("Deleted group {} from account {}", group_id, account_id);

        let pushed = self.push(&account, "group", group_id);
        self.store_event(user_id, group_id, account_id, Activity::GroupDeleted, group_meta(&group));
        pushed
    }
}

fn check_group_unlinked(account: &Account, group_id: &str) -> Result<()> {
    if let Some(route) = account.route_group_links().get(group_id) {
        return Err(Error::invalid_argument(format!(
            "group has been linked to route: {}",
            route.net_id
        )));
    }

    let linked_policy = account.policies.values().find(|p| {
        p.rules
            .iter()
            .any(|r| r.sources.iter().chain(&r.destinations).any(|g| g == group_id))
    });
    if let Some(policy) = linked_policy {
        return Err(Error::invalid_argument(format!(
            "group has been linked to policy: {}",
            policy.name
        )));
    }
    Ok(())
}

fn group_meta(group: &Group) -> HashMap<String, serde_json::Value> {
    HashMap::from([
        ("name".to_string(), group.name.clone().into()),
        ("group_id".to_string(), group.id.clone().into()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::tests::{add_peer, fixture, serial, ACCOUNT, ADMIN};
    use meshplane_common::{Policy, Store};

    fn new_group(name: &str, peers: &[&str]) -> Group {
        Group {
            id: String::new(),
            name: name.to_string(),
            peers: peers.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_save_and_get_group() {
        let f = fixture();
        let p1 = add_peer(&f.manager, "p1");

        let group = f.manager.save_group(ACCOUNT, ADMIN, new_group("dev", &[&p1.id, &p1.id])).unwrap();
        assert!(!group.id.is_empty());
        assert_eq!(group.peers, vec![p1.id.clone()]);
        assert_eq!(f.manager.get_group(ACCOUNT, &group.id, ADMIN).unwrap(), group);
        assert_eq!(f.events.all().last().unwrap().activity, Activity::GroupCreated);

        let mut renamed = group.clone();
        renamed.name = "devs".to_string();
        f.manager.save_group(ACCOUNT, ADMIN, renamed).unwrap();
        assert_eq!(f.events.all().last().unwrap().activity, Activity::GroupUpdated);

        let names: Vec<_> = f
            .manager
            .list_groups(ACCOUNT, ADMIN)
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["All", "devs"]);
    }

    #[test]
    fn test_save_group_rejections() {
        let f = fixture();
        let all = f.manager.store.get_account(ACCOUNT).unwrap().get_group_all().unwrap().clone();

        assert!(matches!(
            f.manager.save_group(ACCOUNT, ADMIN, new_group("", &[])),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            f.manager.save_group(ACCOUNT, ADMIN, new_group("dev", &["ghost"])),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            f.manager.save_group(ACCOUNT, ADMIN, new_group(GROUP_ALL, &[])),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            f.manager.save_group(ACCOUNT, ADMIN, all),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_group_membership() {
        let f = fixture();
        let p1 = add_peer(&f.manager, "p1");
        let group = f.manager.save_group(ACCOUNT, ADMIN, new_group("dev", &[])).unwrap();

        f.manager.group_add_peer(ACCOUNT, &group.id, &p1.id, ADMIN).unwrap();
        let before = serial(&f.manager);
        // already a member
        f.manager.group_add_peer(ACCOUNT, &group.id, &p1.id, ADMIN).unwrap();
        assert_eq!(serial(&f.manager), before);
        assert!(f.manager.get_group(ACCOUNT, &group.id, ADMIN).unwrap().contains(&p1.id));

        f.manager.group_delete_peer(ACCOUNT, &group.id, &p1.id, ADMIN).unwrap();
        assert!(f.manager.get_group(ACCOUNT, &group.id, ADMIN).unwrap().peers.is_empty());
        assert!(matches!(
            f.manager.group_delete_peer(ACCOUNT, &group.id, &p1.id, ADMIN),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            f.manager.group_add_peer(ACCOUNT, &group.id, "ghost", ADMIN),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            f.manager.group_add_peer(ACCOUNT, "ghost", &p1.id, ADMIN),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_group_links() {
        let f = fixture();
        let linked = f.manager.save_group(ACCOUNT, ADMIN, new_group("dist", &[])).unwrap();
        let free = f.manager.save_group(ACCOUNT, ADMIN, new_group("free", &[])).unwrap();
        f.manager
            .create_route(ACCOUNT, "10.0.0.0/8", "", "", "", "net", false, 1, &[linked.id.clone()], true, ADMIN)
            .unwrap();

        assert!(matches!(
            f.manager.delete_group(ACCOUNT, &linked.id, ADMIN),
            Err(Error::InvalidArgument(_))
        ));

        let mut policy = Policy::allow_all(&free.id);
        policy.id = String::new();
        f.manager.save_policy(ACCOUNT, ADMIN, policy).unwrap();
        assert!(matches!(
            f.manager.delete_group(ACCOUNT, &free.id, ADMIN),
            Err(Error::InvalidArgument(_))
        ));

        let all_id = f.manager.store.get_account(ACCOUNT).unwrap().get_group_all().unwrap().id.clone();
        assert!(matches!(
            f.manager.delete_group(ACCOUNT, &all_id, ADMIN),
            Err(Error::InvalidArgument(_))
        ));

        let unlinked = f.manager.save_group(ACCOUNT, ADMIN, new_group("tmp", &[])).unwrap();
        f.manager.delete_group(ACCOUNT, &unlinked.id, ADMIN).unwrap();
        assert!(matches!(
            f.manager.get_group(ACCOUNT, &unlinked.id, ADMIN),
            Err(Error::NotFound { .. })
        ));
    }
}
