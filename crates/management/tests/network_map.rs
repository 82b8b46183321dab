use meshplane_common::{Database, Group, InMemoryEventStore, Peer, Policy, PolicyAction, WgKeyPair};
use meshplane_management::{AccountManager, PeersUpdateManager, RouteUpdateKind, RouteUpdateOperation};
use std::sync::Arc;

const ACCOUNT: &str = "acc";
const ADMIN: &str = "admin";

fn manager() -> AccountManager {
    let manager = AccountManager::new(
        Arc::new(Database::open_memory().unwrap()),
        Arc::new(InMemoryEventStore::new()),
        Arc::new(PeersUpdateManager::new(16)),
    );
    manager.create_account(ACCOUNT, ADMIN, "example.com").unwrap();
    manager
}

fn peer(manager: &AccountManager, name: &str) -> Peer {
    let key = WgKeyPair::generate().public_key_base64();
    manager.add_peer(ACCOUNT, ADMIN, &key, name).unwrap()
}

fn group(manager: &AccountManager, name: &str, peers: &[&Peer]) -> Group {
    manager
        .save_group(
            ACCOUNT,
            ADMIN,
            Group {
                id: String::new(),
                name: name.to_string(),
                peers: peers.iter().map(|p| p.id.clone()).collect(),
            },
        )
        .unwrap()
}

/// A route egressing through a three-member peers group reaches every member
/// through the two other members; removing a member drops its replicas.
#[test]
fn ha_routes_replicate_per_member() {
    let manager = manager();
    let p1 = peer(&manager, "p1");
    let p2 = peer(&manager, "p2");
    let p3 = peer(&manager, "p3");
    let ha = group(&manager, "routers", &[&p1, &p2, &p3]);

    let route = manager
        .create_route(
            ACCOUNT,
            "192.168.0.0/16",
            "",
            &ha.id,
            "ha route",
            "superNet",
            false,
            9999,
            &[ha.id.clone()],
            true,
            ADMIN,
        )
        .unwrap();

    for p in [&p1, &p2, &p3] {
        let map = manager.get_network_map(&p.id).unwrap();
        assert_eq!(map.routes.len(), 2, "peer {}", p.name);
        for r in &map.routes {
            assert!(r.id.starts_with(&format!("{}:", route.id)));
            assert_ne!(r.peer(), p.key, "a peer never routes through itself");
            assert_eq!(r.peers_group(), "");
        }
    }

    manager.group_delete_peer(ACCOUNT, &ha.id, &p1.id, ADMIN).unwrap();

    assert!(manager.get_network_map(&p1.id).unwrap().routes.is_empty());
    let map = manager.get_network_map(&p2.id).unwrap();
    assert_eq!(map.routes.len(), 1);
    assert_eq!(map.routes[0].id, format!("{}:{}", route.id, p3.id));
    assert_eq!(map.routes[0].peer(), p3.key);
}

/// Peers group members receive the route even when the distribution groups
/// only name some of them.
#[test]
fn ha_members_outside_distribution_groups_get_replicas() {
    let manager = manager();
    let p1 = peer(&manager, "p1");
    let p2 = peer(&manager, "p2");
    let p3 = peer(&manager, "p3");
    let g1 = group(&manager, "g1", &[&p1]);
    let g2 = group(&manager, "g2", &[&p2]);
    let ha = group(&manager, "routers", &[&p1, &p2, &p3]);

    manager
        .create_route(
            ACCOUNT,
            "192.168.0.0/16",
            "",
            &ha.id,
            "ha route",
            "superNet",
            false,
            9999,
            &[g1.id.clone(), g2.id.clone()],
            true,
            ADMIN,
        )
        .unwrap();

    for p in [&p1, &p2, &p3] {
        let map = manager.get_network_map(&p.id).unwrap();
        assert_eq!(map.routes.len(), 2, "peer {}", p.name);
    }
}

#[test]
fn route_sync_follows_route_groups_and_policies() {
    let manager = manager();
    let router = peer(&manager, "router");
    let client = peer(&manager, "client");
    let dist = group(&manager, "dist", &[&router]);

    let route = manager
        .create_route(
            ACCOUNT,
            "10.10.0.0/16",
            &router.id,
            "",
            "",
            "office",
            true,
            10,
            &[dist.id.clone()],
            false,
            ADMIN,
        )
        .unwrap();

    // disabled
    assert!(manager.get_network_map(&router.id).unwrap().routes.is_empty());

    let enable = [RouteUpdateOperation::new(RouteUpdateKind::Enabled, "true")];
    manager.update_route(ACCOUNT, &route.id, &enable, ADMIN).unwrap();
    let map = manager.get_network_map(&router.id).unwrap();
    assert_eq!(map.routes.len(), 1);
    assert_eq!(map.routes[0].peer(), router.key);

    // client is not in the distribution group yet
    assert!(manager.get_network_map(&client.id).unwrap().routes.is_empty());

    manager.group_add_peer(ACCOUNT, &dist.id, &client.id, ADMIN).unwrap();
    let map = manager.get_network_map(&client.id).unwrap();
    assert_eq!(map.routes.len(), 1);
    assert_eq!(map.routes[0].peer(), router.key);
    assert_eq!(map.remote_peers.len(), 1);

    // only the router may talk to itself: the client loses the route
    let isolated = group(&manager, "isolated", &[&router]);
    for policy in manager.list_policies(ACCOUNT, ADMIN).unwrap() {
        manager.delete_policy(ACCOUNT, &policy.id, ADMIN).unwrap();
    }
    let mut policy = Policy::allow_all(&isolated.id);
    policy.id = String::new();
    manager.save_policy(ACCOUNT, ADMIN, policy).unwrap();

    let map = manager.get_network_map(&client.id).unwrap();
    assert!(map.routes.is_empty());
    assert!(map.remote_peers.is_empty());
    assert_eq!(manager.get_network_map(&router.id).unwrap().routes.len(), 1);
}

#[test]
fn drop_rules_do_not_grant_reachability() {
    let manager = manager();
    let router = peer(&manager, "router");
    let client = peer(&manager, "client");
    let dist = group(&manager, "dist", &[&client]);
    let routers = group(&manager, "routers", &[&router]);

    manager
        .create_route(ACCOUNT, "10.0.0.0/8", &router.id, "", "", "net", false, 1, &[dist.id.clone()], true, ADMIN)
        .unwrap();

    for policy in manager.list_policies(ACCOUNT, ADMIN).unwrap() {
        manager.delete_policy(ACCOUNT, &policy.id, ADMIN).unwrap();
    }
    let mut deny = Policy::allow_all(&dist.id);
    deny.id = String::new();
    deny.name = "deny".to_string();
    deny.rules[0].action = PolicyAction::Drop;
    deny.rules[0].destinations = vec![routers.id.clone()];
    manager.save_policy(ACCOUNT, ADMIN, deny).unwrap();

    assert!(manager.get_network_map(&client.id).unwrap().routes.is_empty());
}

#[tokio::test]
async fn connected_peers_receive_updates() {
    let manager = manager();
    let router = peer(&manager, "router");
    let client = peer(&manager, "client");
    let all = manager
        .list_groups(ACCOUNT, ADMIN)
        .unwrap()
        .into_iter()
        .find(|g| g.name == "All")
        .unwrap();

    let mut rx = manager.peers_update_manager().create_channel(&client.id);

    manager
        .create_route(ACCOUNT, "172.16.0.0/12", &router.id, "", "", "lab", false, 100, &[all.id], true, ADMIN)
        .unwrap();

    let update = rx.recv().await.unwrap();
    let map = update.network_map.unwrap();
    assert_eq!(map.routes.len(), 1);
    assert_eq!(map.routes[0].network, "172.16.0.0/12");
    assert_eq!(map.routes[0].peer, router.key);
    assert_eq!(map.routes[0].network_type, 1);
    assert_eq!(map.remote_peers[0].wg_pub_key, router.key);
}
