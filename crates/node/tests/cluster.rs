//! End-to-end scenarios over the in-process hub.

use hearsay_core::ConsensusCore;
use hearsay_messages::RpcCommand;
use hearsay_network_memory::{Hub, HubConfig, MemTransport};
use hearsay_node::{Node, NodeConfig, NodeState};
use hearsay_proxy::InmemProxy;
use hearsay_test_helpers::fixtures::{self, NodeSeed};
use hearsay_test_helpers::{init_tracing, wait_until, MemoryStore, SimApp, SimCore};
use hearsay_types::{NodeId, PeerSet};
use std::sync::Arc;
use std::time::Duration;

type TestNode = Node<SimCore, MemoryStore, MemTransport, Arc<InmemProxy<SimApp>>>;

fn test_config() -> NodeConfig {
    NodeConfig {
        heartbeat: Duration::from_millis(20),
        slow_heartbeat: Duration::from_millis(300),
        sync_limit: 1000,
    }
}

/// Assemble a node from fixture collaborators, with a hook to prepare the
/// core (seeding, anchors) before the node takes ownership of it.
fn build_node(
    hub: &Arc<Hub>,
    seed: &NodeSeed,
    peers: PeerSet,
    config: NodeConfig,
    prepare: impl FnOnce(&mut SimCore),
) -> (TestNode, Arc<InmemProxy<SimApp>>) {
    let mut collab = fixtures::collaborators(hub, seed, peers.clone());
    prepare(&mut collab.core);

    let node = Node::new(
        config,
        seed.id,
        seed.signing_key.clone(),
        peers,
        collab.core,
        collab.store,
        collab.transport,
        Arc::clone(&collab.proxy),
    );
    node.init().unwrap();
    (node, collab.proxy)
}

#[test]
fn solo_join_then_catchup() {
    init_tracing();
    let hub = Hub::new(HubConfig::default());
    let seed_a = fixtures::node_seed(1);
    let seed_b = fixtures::node_seed(2);

    // A starts alone, with only itself in its peer set.
    let (a, _) = build_node(
        &hub,
        &seed_a,
        fixtures::peer_set(&[&seed_a]),
        test_config(),
        |_| {},
    );
    let _ = a.run_async(None, true);

    // B knows nothing but A's address.
    let (b, _) = build_node(
        &hub,
        &seed_b,
        fixtures::peer_set(&[&seed_b]),
        test_config(),
        |_| {},
    );
    let _ = b.run_async(Some(seed_a.addr.clone()), true);

    // Joining -> CatchingUp -> Babbling.
    assert!(
        wait_until(Duration::from_secs(5), || b.state() == NodeState::Babbling),
        "joiner never reached Babbling; state: {}",
        b.state()
    );

    let traffic = hub.traffic();
    assert_eq!(traffic.join, 1);
    assert!(traffic.fast_forward >= 1);

    // The lone node manufactured events so consensus could emit a frame;
    // the joiner adopted it.
    assert!(b.known_events().get(seed_a.id) >= 0);

    // The ratified join spreads A's membership to include B.
    assert!(wait_until(Duration::from_secs(2), || {
        a.peers().contains(seed_b.id)
    }));

    a.shutdown();
    b.shutdown();
}

#[test]
fn gossip_pull_then_push() {
    init_tracing();
    let hub = Hub::new(HubConfig::default());
    let seed_a = fixtures::node_seed(1);
    let seed_b = fixtures::node_seed(2);
    let peers = fixtures::peer_set(&[&seed_a, &seed_b]);

    let (a, proxy_a) = build_node(&hub, &seed_a, peers.clone(), test_config(), |_| {});
    let (b, proxy_b) = build_node(&hub, &seed_b, peers, test_config(), |_| {});
    let _ = a.run_async(None, true);
    let _ = b.run_async(None, true);

    proxy_a.submit(b"tx-1".to_vec());

    // B learns A's new event through A's push.
    assert!(wait_until(Duration::from_secs(3), || {
        b.known_events().get(seed_a.id) >= 0
    }));

    // Both applications commit the transaction.
    assert!(wait_until(Duration::from_secs(3), || {
        proxy_a.handler().committed() == vec![b"tx-1".to_vec()]
            && proxy_b.handler().committed() == vec![b"tx-1".to_vec()]
    }));

    let eager_after_delivery = hub.traffic().eager_sync;
    assert!(eager_after_delivery >= 1);

    // Once knowledge converges, further heartbeats find empty diffs and
    // send no eager syncs.
    assert!(wait_until(Duration::from_secs(2), || {
        a.known_events() == b.known_events()
    }));
    // Let any in-flight round finish before sampling.
    std::thread::sleep(Duration::from_millis(150));
    let settled = hub.traffic().eager_sync;
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(hub.traffic().eager_sync, settled);

    a.shutdown();
    b.shutdown();
}

#[test]
fn sync_limit_forces_fast_forward() {
    init_tracing();
    let hub = Hub::new(HubConfig::default());
    let seed_a = fixtures::node_seed(1);
    let seed_b = fixtures::node_seed(2);
    let peers = fixtures::peer_set(&[&seed_a, &seed_b]);

    let config = NodeConfig {
        sync_limit: 3,
        ..test_config()
    };

    let (a, proxy_a) = build_node(&hub, &seed_a, peers.clone(), config.clone(), |_| {});

    // B is far ahead: its sync responses will report the limit instead of
    // shipping ten-plus events.
    let (b, proxy_b) = build_node(&hub, &seed_b, peers, config, |core| {
        core.seed_events(12);
        core.run_consensus().unwrap();
        core.set_anchor_block(core.last_block_index()).unwrap();
    });

    // B only serves; A discovers the divergence by pulling.
    let _ = b.run_async(None, false);
    let _ = a.run_async(None, true);

    assert!(wait_until(Duration::from_secs(5), || {
        hub.traffic().fast_forward >= 1
    }));
    assert!(wait_until(Duration::from_secs(5), || {
        a.state() == NodeState::Babbling && a.known_events().get(seed_b.id) == 11
    }));

    // The snapshot restored A's application to B's committed state.
    assert_eq!(proxy_a.handler().committed(), proxy_b.handler().committed());
    assert_eq!(proxy_a.handler().committed().len(), 12);

    a.shutdown();
    b.shutdown();
}

#[test]
fn idle_cluster_gossips_slowly() {
    init_tracing();
    let hub = Hub::new(HubConfig::default());
    let seed_a = fixtures::node_seed(1);
    let seed_b = fixtures::node_seed(2);
    let peers = fixtures::peer_set(&[&seed_a, &seed_b]);

    let (a, _) = build_node(&hub, &seed_a, peers.clone(), test_config(), |_| {});
    let (b, _) = build_node(&hub, &seed_b, peers, test_config(), |_| {});
    let _ = a.run_async(None, true);
    let _ = b.run_async(None, true);

    // With nothing pending, the interval is the slow base (300ms here,
    // randomized upward), not the 20ms heartbeat.
    std::thread::sleep(Duration::from_millis(200));
    let before = hub.traffic().sync;
    std::thread::sleep(Duration::from_secs(1));
    let pulls = hub.traffic().sync - before;

    assert!(pulls >= 1, "gossip stalled entirely");
    assert!(
        pulls <= 8,
        "idle cluster gossiped {pulls} times in 1s; slow interval not honored"
    );

    a.shutdown();
    b.shutdown();
}

#[test]
fn shutdown_is_ordered_and_idempotent() {
    init_tracing();
    let hub = Hub::new(HubConfig::default());
    let seed_a = fixtures::node_seed(1);
    let seed_b = fixtures::node_seed(2);
    let peers = fixtures::peer_set(&[&seed_a, &seed_b]);

    let (a, proxy_a) = build_node(&hub, &seed_a, peers.clone(), test_config(), |_| {});
    let (b, _) = build_node(&hub, &seed_b, peers, test_config(), |_| {});
    let handle = a.run_async(None, true);
    let _ = b.run_async(None, true);

    // Keep gossip busy while we pull the plug.
    for i in 0..20 {
        proxy_a.submit(format!("tx-{i}").into_bytes());
    }
    std::thread::sleep(Duration::from_millis(50));

    // Returns only after tracked tasks drain; transport and store close
    // after that, so in-flight replies never hit closed handles.
    a.shutdown();
    assert_eq!(a.state(), NodeState::Shutdown);

    // Second call is a no-op.
    a.shutdown();
    assert_eq!(a.state(), NodeState::Shutdown);

    // The lifecycle thread observes Shutdown and exits.
    handle.join().unwrap();

    // Stats stay readable after shutdown.
    assert_eq!(a.stats()["state"], "Shutdown");

    // The survivor keeps running: its gossip to A fails peer-transient and
    // retries on later heartbeats.
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(b.state(), NodeState::Babbling);

    b.shutdown();
    assert_eq!(b.state(), NodeState::Shutdown);
}

#[test]
fn unknown_rpc_gets_error_reply_and_changes_nothing() {
    init_tracing();
    let hub = Hub::new(HubConfig::default());
    let seed_a = fixtures::node_seed(1);

    let (a, _) = build_node(
        &hub,
        &seed_a,
        fixtures::peer_set(&[&seed_a]),
        test_config(),
        |_| {},
    );
    let _ = a.run_async(None, true);

    let reply = hub
        .request(
            NodeId(99),
            &seed_a.addr,
            RpcCommand::Unknown("gossip.v99".into()),
        )
        .unwrap();

    assert!(reply.body.is_none());
    assert!(reply.error.unwrap().contains("gossip.v99"));
    assert_eq!(a.state(), NodeState::Babbling);

    // The node keeps serving normal traffic afterwards.
    let reply = hub
        .request(
            NodeId(99),
            &seed_a.addr,
            RpcCommand::Sync(hearsay_messages::SyncRequest {
                from_id: NodeId(99),
                known: hearsay_types::KnownMap::new(),
            }),
        )
        .unwrap();
    assert!(reply.error.is_none());

    a.shutdown();
}
