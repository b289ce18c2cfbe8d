//! End-to-end tests against storage nodes running in this process

use std::collections::HashMap;
use std::io;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use vidstore::client::{AdminClient, ClientOptions, StorageClient};
use vidstore::node::{NodeStore, StorageService};
use vidstore::protocol::{Request, Response, MAX_FRAME_LEN};
use vidstore::router::{HashRing, NodeState};
use vidstore::server::{RequestHandler, RpcServer};
use vidstore::{
    ContentKey, ContentRouter, ContentStore, NodeServer, NodeServerConfig, StoreError, StoreResult,
};

/// A node serving a temporary directory; the directory lives as long as this
struct TestNode {
    endpoint: String,
    _dir: TempDir,
}

fn start_node() -> TestNode {
    let dir = TempDir::new().unwrap();
    let config = NodeServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        storage_root: dir.path().to_path_buf(),
    };
    let (addr, _) = NodeServer::bind(&config).unwrap().spawn().unwrap();
    TestNode {
        endpoint: addr.to_string(),
        _dir: dir,
    }
}

/// Storage node whose handler is wrapped around the stock one
fn start_node_with<H, F>(wrap: F) -> TestNode
where
    H: RequestHandler,
    F: FnOnce(StorageService) -> H,
{
    let dir = TempDir::new().unwrap();
    let service = StorageService::new(NodeStore::new(dir.path()).unwrap());
    let (addr, _) = RpcServer::bind("storage node", "127.0.0.1:0", Arc::new(wrap(service)))
        .unwrap()
        .spawn()
        .unwrap();
    TestNode {
        endpoint: addr.to_string(),
        _dir: dir,
    }
}

/// Answers ListFiles only after a pause, with the listing taken up front
struct SlowInventory {
    inner: StorageService,
    delay: Duration,
}

impl RequestHandler for SlowInventory {
    fn handle(&self, request: Request) -> StoreResult<Response> {
        let listing = matches!(request, Request::ListFiles);
        let outcome = self.inner.handle(request);
        if listing {
            thread::sleep(self.delay);
        }
        outcome
    }
}

/// Fails every ListFiles
struct BrokenInventory(StorageService);

impl RequestHandler for BrokenInventory {
    fn handle(&self, request: Request) -> StoreResult<Response> {
        match request {
            Request::ListFiles => Err(StoreError::Io(io::Error::other("disk walk failed"))),
            other => self.0.handle(other),
        }
    }
}

fn keys(count: usize) -> Vec<ContentKey> {
    (0..count)
        .map(|i| ContentKey::new(format!("video{}", i % 7), format!("seg{:03}.m4s", i)).unwrap())
        .collect()
}

fn payload(key: &ContentKey) -> Vec<u8> {
    format!("payload of {}", key).into_bytes()
}

fn inventory(endpoint: &str) -> Vec<String> {
    let client = StorageClient::connect(endpoint, ClientOptions::default()).unwrap();
    client.list_files().unwrap()
}

#[test]
fn test_write_read_roundtrip() {
    let nodes: Vec<TestNode> = (0..3).map(|_| start_node()).collect();
    let router =
        ContentRouter::connect(nodes.iter().map(|n| n.endpoint.clone()), ClientOptions::default())
            .unwrap();

    for key in keys(30) {
        router.write(&key, &payload(&key)).unwrap();
    }
    for key in keys(30) {
        assert_eq!(router.read(&key).unwrap(), payload(&key));
    }

    // overwrite replaces content
    let key = ContentKey::new("video0", "seg000.m4s").unwrap();
    router.write(&key, b"second").unwrap();
    assert_eq!(router.read(&key).unwrap(), b"second");

    let missing = ContentKey::new("video0", "absent.m4s").unwrap();
    assert!(router.read(&missing).unwrap_err().is_not_found());
}

#[test]
fn test_each_file_lands_on_its_owner() {
    let nodes: Vec<TestNode> = (0..3).map(|_| start_node()).collect();
    let router =
        ContentRouter::connect(nodes.iter().map(|n| n.endpoint.clone()), ClientOptions::default())
            .unwrap();

    let all = keys(40);
    for key in &all {
        router.write(key, &payload(key)).unwrap();
    }

    let ring = HashRing::new(nodes.iter().map(|n| n.endpoint.as_str()));
    for node in &nodes {
        let mut expected: Vec<String> = all
            .iter()
            .filter(|k| ring.owner(k) == Some(node.endpoint.as_str()))
            .map(|k| k.to_string())
            .collect();
        expected.sort();
        let mut held = inventory(&node.endpoint);
        held.sort();
        assert_eq!(held, expected, "inventory of {}", node.endpoint);
    }
}

#[test]
fn test_routing_is_deterministic_across_routers() {
    let nodes: Vec<TestNode> = (0..3).map(|_| start_node()).collect();
    let endpoints: Vec<String> = nodes.iter().map(|n| n.endpoint.clone()).collect();

    let first = ContentRouter::connect(endpoints.clone(), ClientOptions::default()).unwrap();
    let mut reversed = endpoints.clone();
    reversed.reverse();
    let second = ContentRouter::connect(reversed, ClientOptions::default()).unwrap();

    for key in keys(25) {
        assert_eq!(first.owner_of(&key), second.owner_of(&key));
    }
}

#[test]
fn test_storage_client_delete_is_idempotent() {
    let node = start_node();
    let client = StorageClient::connect(node.endpoint.as_str(), ClientOptions::default()).unwrap();
    let key = ContentKey::new("live", "chunk1.m4s").unwrap();

    client.write_file(&key, b"abc".to_vec()).unwrap();
    assert_eq!(client.list_files().unwrap(), vec!["live/chunk1.m4s".to_string()]);

    client.delete_file(&key).unwrap();
    client.delete_file(&key).unwrap();
    assert!(client.list_files().unwrap().is_empty());
    assert!(client.read_file(&key).unwrap_err().is_not_found());
    client.ping().unwrap();
}

#[test]
fn test_add_node_moves_only_reassigned_files() {
    let nodes: Vec<TestNode> = (0..2).map(|_| start_node()).collect();
    let router =
        ContentRouter::connect(nodes.iter().map(|n| n.endpoint.clone()), ClientOptions::default())
            .unwrap();

    let all = keys(60);
    for key in &all {
        router.write(key, &payload(key)).unwrap();
    }
    let before: HashMap<ContentKey, String> =
        all.iter().map(|k| (k.clone(), router.owner_of(k).unwrap())).collect();
    let epoch = router.epoch();

    let added = start_node();
    let migrated = router.add_node(&added.endpoint).unwrap();
    assert!(router.epoch() > epoch);

    let after = HashRing::new(
        nodes
            .iter()
            .map(|n| n.endpoint.as_str())
            .chain(std::iter::once(added.endpoint.as_str())),
    );
    let expected_moves = all
        .iter()
        .filter(|k| after.owner(k) != Some(before[*k].as_str()))
        .count();
    assert_eq!(migrated as usize, expected_moves);

    // only keys reassigned to the new node moved
    for key in &all {
        let owner = after.owner(key).unwrap();
        assert!(owner == before[key] || owner == added.endpoint);
        assert_eq!(router.owner_of(key).as_deref(), Some(owner));
        assert_eq!(router.read(key).unwrap(), payload(key));
    }

    let mut held = inventory(&added.endpoint);
    held.sort();
    let mut expected: Vec<String> = all
        .iter()
        .filter(|k| after.owner(k) == Some(added.endpoint.as_str()))
        .map(|k| k.to_string())
        .collect();
    expected.sort();
    assert_eq!(held, expected);

    // a second AddNode of the same node is a rescan with nothing to move
    assert_eq!(router.add_node(&added.endpoint).unwrap(), 0);
    assert_eq!(router.list_nodes().len(), 3);
}

#[test]
fn test_remove_node_keeps_every_file_readable() {
    let nodes: Vec<TestNode> = (0..3).map(|_| start_node()).collect();
    let router =
        ContentRouter::connect(nodes.iter().map(|n| n.endpoint.clone()), ClientOptions::default())
            .unwrap();

    let all = keys(50);
    for key in &all {
        router.write(key, &payload(key)).unwrap();
    }

    let victim = nodes[1].endpoint.clone();
    let held = inventory(&victim).len();
    let migrated = router.remove_node(&victim).unwrap();
    assert_eq!(migrated as usize, held);

    assert!(!router.list_nodes().contains(&victim));
    assert_eq!(router.node_state(&victim), None);
    assert!(!router.ring().contains(&victim));
    assert!(inventory(&victim).is_empty());

    for key in &all {
        assert_ne!(router.owner_of(key).as_deref(), Some(victim.as_str()));
        assert_eq!(router.read(key).unwrap(), payload(key));
    }
}

#[test]
fn test_remove_last_node_leaves_router_unavailable() {
    let node = start_node();
    let router = ContentRouter::connect([node.endpoint.clone()], ClientOptions::default()).unwrap();

    let key = ContentKey::new("vid", "a.mp4").unwrap();
    router.write(&key, &[0x5a; 100]).unwrap();

    assert_eq!(router.remove_node(&node.endpoint).unwrap(), 0);
    assert!(router.list_nodes().is_empty());
    assert!(router.read(&key).unwrap_err().is_unavailable());

    // the file was not moved anywhere, so it is still on disk
    assert_eq!(inventory(&node.endpoint), vec!["vid/a.mp4".to_string()]);
}

#[test]
fn test_empty_router_is_unavailable() {
    let router = ContentRouter::new(ClientOptions::default());
    let key = ContentKey::new("a", "b").unwrap();
    assert!(router.write(&key, b"x").unwrap_err().is_unavailable());
    assert!(ContentStore::read(&router, "a", "b").unwrap_err().is_unavailable());
}

#[test]
fn test_membership_errors() {
    let node = start_node();
    let router = ContentRouter::connect([node.endpoint.clone()], ClientOptions::default()).unwrap();

    let err = router.remove_node("127.0.0.1:1").unwrap_err();
    assert!(matches!(err, StoreError::NodeNotFound(_)));

    // a port nothing listens on any more
    let closed = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().to_string();
    let epoch = router.epoch();
    let err = router.add_node(&closed).unwrap_err();
    assert!(matches!(err, StoreError::ConnectFailure { .. }));
    assert_eq!(router.epoch(), epoch);
    assert_eq!(router.list_nodes(), vec![node.endpoint.clone()]);
    assert_eq!(router.node_state(&node.endpoint), Some(NodeState::Live));
}

#[test]
fn test_admin_protocol() {
    let first = start_node();
    let second = start_node();
    let router = Arc::new(
        ContentRouter::connect([first.endpoint.clone()], ClientOptions::default()).unwrap(),
    );
    let admin_addr = router.start_admin("127.0.0.1:0").unwrap();
    let admin = AdminClient::new(admin_addr.to_string(), ClientOptions::default());

    assert_eq!(admin.list_nodes().unwrap(), vec![first.endpoint.clone()]);

    let all = keys(20);
    for key in &all {
        router.write(key, &payload(key)).unwrap();
    }

    let migrated = admin.add_node(&second.endpoint).unwrap();
    assert_eq!(migrated as usize, inventory(&second.endpoint).len());

    let mut expected = vec![first.endpoint.clone(), second.endpoint.clone()];
    expected.sort();
    assert_eq!(admin.list_nodes().unwrap(), expected);

    let err = admin.remove_node("127.0.0.1:1").unwrap_err();
    assert!(matches!(err, StoreError::NodeNotFound(_)));

    admin.remove_node(&first.endpoint).unwrap();
    assert_eq!(admin.list_nodes().unwrap(), vec![second.endpoint.clone()]);
    assert_eq!(inventory(&second.endpoint).len(), all.len());
    for key in &all {
        assert_eq!(router.read(key).unwrap(), payload(key));
    }
}

#[test]
fn test_write_during_remove_node_is_not_lost() {
    let draining = start_node_with(|inner| SlowInventory {
        inner,
        delay: Duration::from_millis(500),
    });
    let other = start_node();
    let router = Arc::new(
        ContentRouter::connect(
            [draining.endpoint.clone(), other.endpoint.clone()],
            ClientOptions::default(),
        )
        .unwrap(),
    );

    let key = keys(200)
        .into_iter()
        .find(|k| router.owner_of(k).as_deref() == Some(draining.endpoint.as_str()))
        .unwrap();

    let remover = {
        let router = Arc::clone(&router);
        let endpoint = draining.endpoint.clone();
        thread::spawn(move || router.remove_node(&endpoint))
    };

    // lands while the departing node's inventory is in flight
    thread::sleep(Duration::from_millis(150));
    router.write(&key, b"acked").unwrap();

    remover.join().unwrap().unwrap();
    assert_eq!(router.list_nodes(), vec![other.endpoint.clone()]);
    assert_eq!(router.read(&key).unwrap(), b"acked");
}

#[test]
fn test_remove_node_keeps_node_live_when_inventory_fails() {
    let broken = start_node_with(BrokenInventory);
    let healthy = start_node();
    let router = ContentRouter::connect(
        [broken.endpoint.clone(), healthy.endpoint.clone()],
        ClientOptions::default(),
    )
    .unwrap();

    let all = keys(30);
    for key in &all {
        router.write(key, &payload(key)).unwrap();
    }
    let owners: Vec<Option<String>> = all.iter().map(|k| router.owner_of(k)).collect();

    let err = router.remove_node(&broken.endpoint).unwrap_err();
    assert!(matches!(err, StoreError::Io(_)));

    assert_eq!(router.node_state(&broken.endpoint), Some(NodeState::Live));
    assert!(router.ring().contains(&broken.endpoint));
    for (key, owner) in all.iter().zip(&owners) {
        assert_eq!(&router.owner_of(key), owner);
        assert_eq!(router.read(key).unwrap(), payload(key));
    }
}

#[test]
fn test_traffic_during_membership_changes() {
    let nodes: Vec<TestNode> = (0..3).map(|_| start_node()).collect();
    let router =
        ContentRouter::connect(nodes.iter().map(|n| n.endpoint.clone()), ClientOptions::default())
            .unwrap();

    let existing = keys(60);
    for key in &existing {
        router.write(key, &payload(key)).unwrap();
    }

    let added = start_node();
    let stop = AtomicBool::new(false);

    let acked = thread::scope(|s| {
        let writers: Vec<_> = (0..2)
            .map(|w| {
                let router = &router;
                let stop = &stop;
                s.spawn(move || {
                    let mut acked = Vec::new();
                    let mut i = 0;
                    while !stop.load(Ordering::Relaxed) {
                        let key = ContentKey::new(format!("live{}", w), format!("chunk{}.m4s", i))
                            .unwrap();
                        router.write(&key, &payload(&key)).unwrap();
                        acked.push(key);
                        i += 1;
                        thread::sleep(Duration::from_millis(1));
                    }
                    acked
                })
            })
            .collect();

        let reader = s.spawn(|| {
            while !stop.load(Ordering::Relaxed) {
                for key in &existing {
                    match router.read(key) {
                        Ok(data) => assert_eq!(data, payload(key)),
                        // owner changed and the file has not arrived yet
                        Err(e) => assert!(e.is_not_found(), "read {}: {}", key, e),
                    }
                }
            }
        });

        router.add_node(&added.endpoint).unwrap();
        router.remove_node(&nodes[0].endpoint).unwrap();
        stop.store(true, Ordering::Relaxed);

        reader.join().unwrap();
        writers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect::<Vec<_>>()
    });

    assert!(!acked.is_empty());
    assert!(inventory(&nodes[0].endpoint).is_empty());
    for key in existing.iter().chain(&acked) {
        assert_eq!(router.read(key).unwrap(), payload(key), "{}", key);
    }
}

#[test]
fn test_oversize_write_is_refused_before_sending() {
    let node = start_node();
    let client = StorageClient::connect(node.endpoint.as_str(), ClientOptions::default()).unwrap();
    let key = ContentKey::new("big", "whole-movie.mp4").unwrap();

    let err = client.write_file(&key, vec![0u8; MAX_FRAME_LEN]).unwrap_err();
    assert!(matches!(err, StoreError::Protocol(_)));

    client.ping().unwrap();
    assert!(client.list_files().unwrap().is_empty());
}
