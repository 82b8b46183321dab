//! Policy operations

use super::AccountManager;
use meshplane_common::{new_id, Activity, Error, Policy, Result};
use tracing::info;

impl AccountManager {
    /// Create a policy, or replace it when `policy.id` names an existing one; administrators only
    pub fn save_policy(&self, account_id: &str, user_id: &str, mut policy: Policy) -> Result<Policy> {
        let _lock = self.locks.acquire(account_id);
        let mut account = self.store.get_account(account_id)?;
        account.require_admin(user_id, "Policies")?;

        if policy.name.is_empty() {
            return Err(Error::invalid_argument("policy name should not be empty"));
        }
        for rule in &mut policy.rules {
            for group_id in rule.sources.iter().chain(&rule.destinations) {
                if account.get_group(group_id).is_none() {
                    return Err(Error::invalid_argument(format!("group id {} not found", group_id)));
                }
            }
            if rule.id.is_empty() {
                rule.id = new_id();
            }
        }

        let activity = if policy.id.is_empty() || !account.policies.contains_key(&policy.id) {
            if policy.id.is_empty() {
                policy.id = new_id();
            }
            Activity::PolicyAdded
        } else {
            Activity::PolicyUpdated
        };
        account.policies.insert(policy.id.clone(), policy.clone());

        self.persist(&mut account)?;
        info!("Saved policy {} ({}) in account {}", policy.name, policy.id, account_id);

        let pushed = self.push(&account, "policy", &policy.id);
        self.store_event(user_id, &policy.id, account_id, activity, policy.event_meta());
        pushed?;
        Ok(policy)
    }

    pub fn delete_policy(&self, account_id: &str, policy_id: &str, user_id: &str) -> Result<()> {
        let _lock = self.locks.acquire(account_id);
        let mut account = self.store.get_account(account_id)?;
        account.require_admin(user_id, "Policies")?;

        let policy = account
            .policies
            .remove(policy_id)
            .ok_or_else(|| Error::not_found("policy", policy_id))?;

        self.persist(&mut account)?;
        info!("Deleted policy {} from account {}", policy_id, account_id);

        let pushed = self.push(&account, "policy", policy_id);
        self.store_event(user_id, policy_id, account_id, Activity::PolicyRemoved, policy.event_meta());
        pushed
    }

    /// Policies of the account ordered by name; administrators only
    pub fn list_policies(&self, account_id: &str, user_id: &str) -> Result<Vec<Policy>> {
        let _lock = self.locks.acquire(account_id);
        let account = self.store.get_account(account_id)?;
        account.require_admin(user_id, "Policies")?;

        let mut policies: Vec<Policy> = account.policies.into_values().collect();
        policies.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(policies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::tests::{fixture, ACCOUNT, ADMIN};
    use meshplane_common::{PolicyAction, PolicyRule, UserRole, DEFAULT_POLICY};

    fn rule(sources: &[&str], destinations: &[&str]) -> PolicyRule {
        PolicyRule {
            id: String::new(),
            name: "rule".to_string(),
            enabled: true,
            action: PolicyAction::Accept,
            bidirectional: false,
            sources: sources.iter().map(|s| s.to_string()).collect(),
            destinations: destinations.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn policy(name: &str, rules: Vec<PolicyRule>) -> Policy {
        Policy {
            id: String::new(),
            name: name.to_string(),
            description: String::new(),
            enabled: true,
            rules,
        }
    }

    #[test]
    fn test_policy_lifecycle() {
        let f = fixture();
        let defaults = f.manager.list_policies(ACCOUNT, ADMIN).unwrap();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].name, DEFAULT_POLICY);
        let all_id = defaults[0].rules[0].sources[0].clone();

        let saved = f
            .manager
            .save_policy(ACCOUNT, ADMIN, policy("ssh", vec![rule(&[&all_id], &[&all_id])]))
            .unwrap();
        assert!(!saved.id.is_empty());
        assert!(!saved.rules[0].id.is_empty());
        assert_eq!(f.events.all().last().unwrap().activity, Activity::PolicyAdded);

        let mut changed = saved.clone();
        changed.enabled = false;
        f.manager.save_policy(ACCOUNT, ADMIN, changed).unwrap();
        assert_eq!(f.events.all().last().unwrap().activity, Activity::PolicyUpdated);

        f.manager.delete_policy(ACCOUNT, &saved.id, ADMIN).unwrap();
        assert_eq!(f.manager.list_policies(ACCOUNT, ADMIN).unwrap().len(), 1);
        assert!(matches!(
            f.manager.delete_policy(ACCOUNT, &saved.id, ADMIN),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_policy_validation() {
        let f = fixture();
        assert!(matches!(
            f.manager.save_policy(ACCOUNT, ADMIN, policy("bad", vec![rule(&["ghost"], &[])])),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            f.manager.save_policy(ACCOUNT, ADMIN, policy("", vec![])),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_policies_require_admin() {
        let f = fixture();
        f.manager.add_user(ACCOUNT, ADMIN, "bob", UserRole::User).unwrap();
        assert!(matches!(
            f.manager.list_policies(ACCOUNT, "bob"),
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            f.manager.save_policy(ACCOUNT, "bob", policy("p", vec![])),
            Err(Error::PermissionDenied(_))
        ));
    }
}
