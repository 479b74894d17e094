//! Behavioural tests for the peer store
//!
//! Every scenario runs against both engines: once in memory and once on a
//! redb file in a temporary directory.

use std::collections::HashSet;
use std::sync::Arc;

use peerbook_core::{Keypair, MetadataKey, Multiaddr, PeerId, PeerKey, SemVerProtocol, SignedPeerRecord};
use peerbook_storage::{
    InMemoryEngine, PeerRepository, PeerStoreConfig, RedbEngine, RedbEngineConfig, StorageEngine,
    StorageError,
};
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

async fn memory_repo() -> PeerRepository<InMemoryEngine> {
    peerbook_logging::try_init_for_tests();
    PeerRepository::open(Arc::new(InMemoryEngine::new()), PeerStoreConfig::default())
        .await
        .expect("Failed to open in-memory store")
}

async fn redb_repo() -> (PeerRepository<RedbEngine>, TempDir) {
    peerbook_logging::try_init_for_tests();
    let temp_dir = TempDir::new().unwrap();
    let config = RedbEngineConfig {
        db_path: temp_dir.path().join("peers.redb"),
        ..Default::default()
    };
    let engine = RedbEngine::open(config).expect("Failed to open redb");
    let repo = PeerRepository::open(Arc::new(engine), PeerStoreConfig::default())
        .await
        .expect("Failed to open redb store");
    (repo, temp_dir)
}

fn addr(s: &str) -> Multiaddr {
    s.parse().unwrap()
}

fn proto(s: &str) -> SemVerProtocol {
    s.parse().unwrap()
}

fn signed(keypair: &Keypair, seq: u64) -> SignedPeerRecord {
    let address = addr(&format!("/ip4/192.168.0.{}/tcp/4001", seq % 250));
    SignedPeerRecord::new(keypair, seq, vec![address]).unwrap()
}

macro_rules! engine_tests {
    ($($name:ident),* $(,)?) => {
        mod in_memory {
            $(
                #[tokio::test]
                async fn $name() {
                    let repo = super::memory_repo().await;
                    super::$name(&repo).await;
                }
            )*
        }

        mod on_disk {
            $(
                #[tokio::test]
                async fn $name() {
                    let (repo, _temp) = super::redb_repo().await;
                    super::$name(&repo).await;
                }
            )*
        }
    };
}

engine_tests!(
    duplicate_address_yields_one_row,
    duplicates_within_one_call_collapse,
    remove_all_addresses_empties_the_book,
    retention_keeps_three_highest,
    most_recent_record_is_highest_or_none,
    record_round_trips,
    repeated_adds_create_one_entry,
    bare_key_never_erases_full_key,
    peers_supporting_matches_exactly,
    identity_comes_from_the_address_alone,
    address_lookups_resolve_stored_peers,
    metadata_requires_peer_and_rejects_duplicates,
    remove_key_cascades_to_children,
    remove_all_keys_wipes_the_store,
    trim_sweep_reports_each_peer,
);

// ============================================================================
// Address book
// ============================================================================

async fn duplicate_address_yields_one_row<E: StorageEngine>(repo: &PeerRepository<E>) {
    let peer = PeerId::random();
    let address = addr("/ip4/1.2.3.4/tcp/4001");

    repo.add_address(&peer, &address).await.unwrap();
    repo.add_address(&peer, &address).await.unwrap();

    assert_eq!(repo.addresses(&peer).await.unwrap(), vec![address]);
}

async fn duplicates_within_one_call_collapse<E: StorageEngine>(repo: &PeerRepository<E>) {
    let peer = PeerId::random();
    let address = addr("/ip4/1.2.3.4/tcp/4001");

    repo.add_addresses(&peer, &[address.clone(), address.clone()])
        .await
        .unwrap();

    assert_eq!(repo.addresses(&peer).await.unwrap(), vec![address]);
}

async fn remove_all_addresses_empties_the_book<E: StorageEngine>(repo: &PeerRepository<E>) {
    let peer = PeerId::random();
    repo.add_addresses(
        &peer,
        &[addr("/ip4/1.2.3.4/tcp/4001"), addr("/dns4/example.com/tcp/443/wss")],
    )
    .await
    .unwrap();

    repo.remove_all_addresses(&peer).await.unwrap();

    assert!(repo.addresses(&peer).await.unwrap().is_empty());
    // The peer itself survives
    assert!(repo.find_entry(&peer).await.unwrap().is_some());
}

async fn identity_comes_from_the_address_alone<E: StorageEngine>(repo: &PeerRepository<E>) {
    let without = addr("/ip4/1.2.3.4/tcp/4001");
    assert!(matches!(
        repo.find_peer_identity(&without),
        Err(StorageError::NoIdentityInAddress(_))
    ));

    let unknown = PeerId::random();
    let with = addr(&format!("/ip4/1.2.3.4/tcp/4001/p2p/{unknown}"));
    assert_eq!(repo.find_peer_identity(&with).unwrap(), unknown);
    assert!(repo.find_peer_record(&with).await.unwrap_err().is_not_found());
}

async fn address_lookups_resolve_stored_peers<E: StorageEngine>(repo: &PeerRepository<E>) {
    let (_, key) = PeerKey::generate_ed25519();
    let address = addr("/ip4/10.1.1.1/udp/4001/quic-v1");
    repo.add_key(&key).await.unwrap();
    repo.add_address(key.peer_id(), &address).await.unwrap();

    let lookup = addr(&format!("/ip4/10.1.1.1/udp/4001/quic-v1/p2p/{}", key.peer_id()));

    let found = repo.peer_key_by_address(&lookup).await.unwrap();
    assert_eq!(found.public_key(), key.public_key());

    let info = repo.peer_info_by_address(&lookup).await.unwrap();
    assert_eq!(info.key, key);
    assert_eq!(info.addresses, vec![address]);
}

// ============================================================================
// Record book
// ============================================================================

async fn retention_keeps_three_highest<E: StorageEngine>(repo: &PeerRepository<E>) {
    let keypair = Keypair::generate_ed25519();
    let peer = keypair.public().to_peer_id();

    for seq in 1..=6 {
        repo.add_record(&signed(&keypair, seq)).await.unwrap();
        assert!(repo.records(&peer).await.unwrap().len() <= 3);
    }

    let seqs: Vec<_> = repo
        .records(&peer)
        .await
        .unwrap()
        .iter()
        .map(SignedPeerRecord::sequence_number)
        .collect();
    assert_eq!(seqs, vec![4, 5, 6]);
}

async fn most_recent_record_is_highest_or_none<E: StorageEngine>(repo: &PeerRepository<E>) {
    let keypair = Keypair::generate_ed25519();
    let peer = keypair.public().to_peer_id();

    repo.add_key(&PeerKey::from_keypair(&keypair)).await.unwrap();
    assert!(repo.most_recent_record(&peer).await.unwrap().is_none());

    for seq in [4, 9, 2] {
        repo.add_record(&signed(&keypair, seq)).await.unwrap();
    }
    let latest = repo.most_recent_record(&peer).await.unwrap().unwrap();
    assert_eq!(latest.sequence_number(), 9);
}

async fn record_round_trips<E: StorageEngine>(repo: &PeerRepository<E>) {
    let keypair = Keypair::generate_ed25519();
    let addresses = vec![
        addr("/ip4/1.2.3.4/tcp/4001"),
        addr("/ip6/2001:db8::1/udp/4001/quic-v1"),
    ];
    let record = SignedPeerRecord::new(&keypair, 42, addresses.clone()).unwrap();

    repo.add_record(&record).await.unwrap();

    let stored = repo.records(record.peer_id()).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].peer_id(), &keypair.public().to_peer_id());
    assert_eq!(stored[0].sequence_number(), 42);
    assert_eq!(stored[0].addresses(), addresses.as_slice());
    assert_eq!(stored[0].marshal(), record.marshal());
}

async fn trim_sweep_reports_each_peer<E: StorageEngine>(repo: &PeerRepository<E>) {
    let first = Keypair::generate_ed25519();
    let second = Keypair::generate_ed25519();
    repo.add_record(&signed(&first, 1)).await.unwrap();
    repo.add_record(&signed(&second, 1)).await.unwrap();
    repo.add_address(&PeerId::random(), &addr("/ip4/1.2.3.4/tcp/1"))
        .await
        .unwrap();

    let summary = repo.trim_all_records().await.unwrap();
    assert_eq!(summary.peers_visited, 3);
    assert_eq!(summary.peers_trimmed, 0);
    assert_eq!(summary.records_removed, 0);
    assert_eq!(summary.peers_skipped, 0);
}

// ============================================================================
// Key book
// ============================================================================

async fn repeated_adds_create_one_entry<E: StorageEngine>(repo: &PeerRepository<E>) {
    let keypair = Keypair::generate_ed25519();
    let key = PeerKey::from_keypair(&keypair);
    let peer = *key.peer_id();

    repo.add_address(&peer, &addr("/ip4/1.2.3.4/tcp/4001")).await.unwrap();
    repo.add_protocol(&peer, &proto("/chat/1.0.0")).await.unwrap();
    repo.add_key(&key).await.unwrap();
    repo.add_record(&signed(&keypair, 1)).await.unwrap();
    repo.add_address(&peer, &addr("/ip4/5.6.7.8/tcp/4001")).await.unwrap();

    assert_eq!(repo.count().await.unwrap(), 1);
}

async fn bare_key_never_erases_full_key<E: StorageEngine>(repo: &PeerRepository<E>) {
    let (_, full) = PeerKey::generate_ed25519();
    let bare = PeerKey::from_peer_id(*full.peer_id());

    repo.add_key(&full).await.unwrap();
    repo.add_key(&bare).await.unwrap();

    let stored = repo.key_for(&full.to_base58()).await.unwrap();
    assert_eq!(stored.public_key(), full.public_key());
}

async fn remove_key_cascades_to_children<E: StorageEngine>(repo: &PeerRepository<E>) {
    let keypair = Keypair::generate_ed25519();
    let key = PeerKey::from_keypair(&keypair);
    let peer = *key.peer_id();
    let bystander = PeerId::random();

    repo.add_key(&key).await.unwrap();
    repo.add_address(&peer, &addr("/ip4/1.2.3.4/tcp/4001")).await.unwrap();
    repo.add_protocol(&peer, &proto("/chat/1.0.0")).await.unwrap();
    repo.add_record(&signed(&keypair, 1)).await.unwrap();
    repo.add_address(&bystander, &addr("/ip4/9.9.9.9/tcp/1")).await.unwrap();

    repo.remove_key(&peer).await.unwrap();

    assert!(repo.find_entry(&peer).await.unwrap().is_none());
    assert!(repo.addresses(&peer).await.unwrap_err().is_not_found());
    assert_eq!(repo.count().await.unwrap(), 1);
    assert_eq!(repo.addresses(&bystander).await.unwrap().len(), 1);

    // Adding again starts from scratch
    repo.add_address(&peer, &addr("/ip4/1.2.3.4/tcp/4001")).await.unwrap();
    assert!(repo.protocols(&peer).await.unwrap().is_empty());
    assert!(repo.records(&peer).await.unwrap().is_empty());
}

async fn remove_all_keys_wipes_the_store<E: StorageEngine>(repo: &PeerRepository<E>) {
    for _ in 0..4 {
        let (_, key) = PeerKey::generate_ed25519();
        repo.add_key(&key).await.unwrap();
        repo.add_protocol(key.peer_id(), &proto("/chat/1.0.0")).await.unwrap();
    }
    assert_eq!(repo.count().await.unwrap(), 4);

    repo.remove_all_keys().await.unwrap();

    assert_eq!(repo.count().await.unwrap(), 0);
    assert!(repo.all().await.unwrap().is_empty());
    assert!(repo.peers_supporting(&proto("/chat/1.0.0")).await.unwrap().is_empty());
}

// ============================================================================
// Protocol and metadata books
// ============================================================================

async fn peers_supporting_matches_exactly<E: StorageEngine>(repo: &PeerRepository<E>) {
    let chat = proto("/chat/1.0.0");
    let alice = PeerId::random();
    let bob = PeerId::random();
    let carol = PeerId::random();

    repo.add_protocols(&alice, &[chat.clone(), proto("/ipfs/id/1.0.0")])
        .await
        .unwrap();
    repo.add_protocol(&bob, &chat).await.unwrap();
    repo.add_protocol(&carol, &proto("/chat/1.1.0")).await.unwrap();

    let found: HashSet<_> = repo.peers_supporting(&chat).await.unwrap().into_iter().collect();
    let expected: HashSet<_> = [alice.to_base58(), bob.to_base58()].into_iter().collect();
    assert_eq!(found, expected);
}

async fn metadata_requires_peer_and_rejects_duplicates<E: StorageEngine>(repo: &PeerRepository<E>) {
    let stranger = PeerId::random();
    let err = repo
        .add_metadata_key(&stranger, MetadataKey::AgentVersion, "peerbook/1.0")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    // A failed metadata add never creates the peer
    assert!(repo.find_entry(&stranger).await.unwrap().is_none());

    let peer = PeerId::random();
    repo.add_address(&peer, &addr("/ip4/1.2.3.4/tcp/4001")).await.unwrap();
    repo.add_metadata_key(&peer, MetadataKey::LatestPing, "12ms")
        .await
        .unwrap();

    let err = repo
        .add_metadata_key(&peer, MetadataKey::LatestPing, "15ms")
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());

    let metadata = repo.metadata(&peer).await.unwrap();
    assert_eq!(metadata[MetadataKey::LatestPing.as_str()], b"12ms".to_vec());
}
