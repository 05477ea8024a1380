//! End-to-end election tests against the deterministic ensemble.

use std::sync::Arc;
use std::time::Duration;

use alder_election::CandidateConfig;
use alder_election::CandidateHandle;
use alder_election::ElectionCandidate;
use alder_election::ElectionError;
use alder_election::ElectionEvent;
use alder_ensemble::CreateMode;
use alder_ensemble::EnsembleClient;
use alder_ensemble::EnsembleError;
use alder_ensemble::SessionConfig;
use alder_testing::DeterministicEnsemble;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

const HOST: &str = "ensemble-a:2181";

async fn next_event(events: &mut UnboundedReceiver<ElectionEvent>) -> ElectionEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream ended")
}

/// Await events until the predicate matches, failing on `Error` events.
async fn await_event<F>(events: &mut UnboundedReceiver<ElectionEvent>, mut predicate: F) -> ElectionEvent
where
    F: FnMut(&ElectionEvent) -> bool,
{
    loop {
        let event = next_event(events).await;
        if let ElectionEvent::Error { cause } = &event {
            panic!("unexpected election fault: {cause}");
        }
        if predicate(&event) {
            return event;
        }
    }
}

fn start_candidate(
    ensemble: &Arc<DeterministicEnsemble>,
    root: &str,
    prefix: &str,
) -> (CandidateHandle, UnboundedReceiver<ElectionEvent>) {
    let config = CandidateConfig::new(HOST, root, prefix).expect("valid config");
    let candidate = ElectionCandidate::new(ensemble.clone(), config);
    let events = candidate.subscribe();
    (candidate.start(), events)
}

async fn assert_no_pending_events(events: &mut UnboundedReceiver<ElectionEvent>) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    if let Ok(event) = events.try_recv() {
        panic!("unexpected trailing event: {event:?}");
    }
}

#[tokio::test]
async fn test_single_candidate_event_order() {
    let ensemble = DeterministicEnsemble::new();
    let (handle, mut events) = start_candidate(&ensemble, "/election", "candidate_");

    match next_event(&mut events).await {
        ElectionEvent::ClientConnected { host } => assert_eq!(host, HOST),
        other => panic!("expected ClientConnected, got {other:?}"),
    }
    match next_event(&mut events).await {
        ElectionEvent::NodeCreated { path } => assert_eq!(path, "/election"),
        other => panic!("expected NodeCreated, got {other:?}"),
    }
    match next_event(&mut events).await {
        ElectionEvent::ChildCreated {
            path,
            is_leader,
            candidate_id,
        } => {
            assert_eq!(path, "/election/candidate_0000000000");
            // Ranking runs after the create, so the flag is still stale.
            assert!(!is_leader);
            assert_eq!(candidate_id, 0);
        }
        other => panic!("expected ChildCreated, got {other:?}"),
    }
    match next_event(&mut events).await {
        ElectionEvent::LeaderChanged {
            is_leader, candidate_id, ..
        } => {
            assert!(is_leader);
            assert_eq!(candidate_id, 0);
        }
        other => panic!("expected LeaderChanged, got {other:?}"),
    }

    assert_no_pending_events(&mut events).await;
    assert!(handle.is_leader());
    assert_eq!(handle.candidate_id(), Some(0));
}

#[tokio::test]
async fn test_two_candidates_transfer_leadership_in_id_order() {
    let ensemble = DeterministicEnsemble::new();

    let (a, mut a_events) = start_candidate(&ensemble, "/election", "candidate_");
    await_event(&mut a_events, |event| {
        matches!(event, ElectionEvent::LeaderChanged { is_leader: true, .. })
    })
    .await;
    assert_eq!(a.candidate_id(), Some(0));

    // A already leads before B's node exists.
    let (b, mut b_events) = start_candidate(&ensemble, "/election", "candidate_");
    let b_created = await_event(&mut b_events, |event| {
        matches!(event, ElectionEvent::ChildCreated { .. })
    })
    .await;
    match b_created {
        ElectionEvent::ChildCreated { candidate_id, .. } => assert_eq!(candidate_id, 1),
        _ => unreachable!(),
    }

    // A observes the membership change without losing leadership.
    await_event(&mut a_events, |event| {
        matches!(event, ElectionEvent::NodeChildrenChanged { .. })
    })
    .await;
    assert_no_pending_events(&mut a_events).await;
    assert!(a.is_leader());
    assert!(!b.is_leader());

    // A steps away; its ephemeral node vanishes with the session.
    a.close();
    match await_event(&mut a_events, |event| {
        matches!(event, ElectionEvent::ClientDisconnected { .. })
    })
    .await
    {
        ElectionEvent::ClientDisconnected {
            host,
            path,
            candidate_id,
        } => {
            assert_eq!(host, HOST);
            assert_eq!(path, "/election/candidate_0000000000");
            assert_eq!(candidate_id, Some(0));
        }
        _ => unreachable!(),
    }

    // B hears the change and takes over: leadership order is [0, 1].
    await_event(&mut b_events, |event| {
        matches!(event, ElectionEvent::NodeChildrenChanged { .. })
    })
    .await;
    match await_event(&mut b_events, |event| {
        matches!(event, ElectionEvent::LeaderChanged { .. })
    })
    .await
    {
        ElectionEvent::LeaderChanged {
            is_leader, candidate_id, ..
        } => {
            assert!(is_leader);
            assert_eq!(candidate_id, 1);
        }
        _ => unreachable!(),
    }
    assert!(b.is_leader());
}

#[tokio::test]
async fn test_forced_root_create_surfaces_node_exists() {
    let ensemble = DeterministicEnsemble::new();
    let (handle, mut events) = start_candidate(&ensemble, "/election", "candidate_");
    await_event(&mut events, |event| {
        matches!(event, ElectionEvent::LeaderChanged { is_leader: true, .. })
    })
    .await;

    handle.create_election_root();
    match next_event(&mut events).await {
        ElectionEvent::Error {
            cause: ElectionError::Ensemble {
                source: EnsembleError::NodeExists { path },
            },
        } => assert_eq!(path, "/election"),
        other => panic!("expected NodeExists fault, got {other:?}"),
    }
    assert_no_pending_events(&mut events).await;
}

#[tokio::test]
async fn test_remove_root_with_live_sibling_is_refused() {
    let ensemble = DeterministicEnsemble::new();
    let (handle, mut events) = start_candidate(&ensemble, "/election", "candidate_");
    await_event(&mut events, |event| {
        matches!(event, ElectionEvent::LeaderChanged { is_leader: true, .. })
    })
    .await;

    // The candidate's own ephemeral node blocks the delete.
    handle.remove_election_root();
    match next_event(&mut events).await {
        ElectionEvent::Error {
            cause: ElectionError::Ensemble {
                source: EnsembleError::NotEmpty { path },
            },
        } => assert_eq!(path, "/election"),
        other => panic!("expected NotEmpty fault, got {other:?}"),
    }
    assert!(ensemble.node_exists("/election").await);
    assert_no_pending_events(&mut events).await;
}

#[tokio::test]
async fn test_unchanged_ranking_emits_nothing() {
    let ensemble = DeterministicEnsemble::new();
    let (a, mut a_events) = start_candidate(&ensemble, "/election", "candidate_");
    await_event(&mut a_events, |event| {
        matches!(event, ElectionEvent::LeaderChanged { is_leader: true, .. })
    })
    .await;

    let (_b, mut b_events) = start_candidate(&ensemble, "/election", "candidate_");
    await_event(&mut b_events, |event| {
        matches!(event, ElectionEvent::ChildCreated { .. })
    })
    .await;

    // A re-fetches and re-ranks; leadership did not flip, so the only
    // event is the membership-change notification itself.
    match await_event(&mut a_events, |event| {
        matches!(event, ElectionEvent::NodeChildrenChanged { .. })
    })
    .await
    {
        ElectionEvent::NodeChildrenChanged {
            path,
            is_leader,
            candidate_id,
        } => {
            assert_eq!(path, "/election");
            assert!(is_leader);
            assert_eq!(candidate_id, Some(0));
        }
        _ => unreachable!(),
    }
    assert_no_pending_events(&mut a_events).await;
    assert!(a.is_leader());
}

#[tokio::test]
async fn test_concurrent_start_registers_both_without_faults() {
    let ensemble = DeterministicEnsemble::new();
    let (a, mut a_events) = start_candidate(&ensemble, "/election", "candidate_");
    let (b, mut b_events) = start_candidate(&ensemble, "/election", "candidate_");

    // Both candidates register; a lost root-creation race must stay
    // invisible to both owners.
    await_event(&mut a_events, |event| {
        matches!(event, ElectionEvent::ChildCreated { .. })
    })
    .await;
    await_event(&mut b_events, |event| {
        matches!(event, ElectionEvent::ChildCreated { .. })
    })
    .await;

    let mut leaders = 0;
    for _ in 0..100 {
        leaders = usize::from(a.is_leader()) + usize::from(b.is_leader());
        if leaders == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(leaders, 1, "exactly one candidate must lead");
    assert_eq!(ensemble.children_of("/election").await.len(), 2);
}

#[tokio::test]
async fn test_session_expiry_disconnects_and_hands_over() {
    let ensemble = DeterministicEnsemble::new();
    let (a, mut a_events) = start_candidate(&ensemble, "/election", "candidate_");
    await_event(&mut a_events, |event| {
        matches!(event, ElectionEvent::LeaderChanged { is_leader: true, .. })
    })
    .await;
    let a_session = ensemble.session_ids().await[0];

    let (b, mut b_events) = start_candidate(&ensemble, "/election", "candidate_");
    await_event(&mut b_events, |event| {
        matches!(event, ElectionEvent::ChildCreated { .. })
    })
    .await;

    assert!(ensemble.expire_session(a_session).await);
    match await_event(&mut a_events, |event| {
        matches!(event, ElectionEvent::ClientDisconnected { .. })
    })
    .await
    {
        ElectionEvent::ClientDisconnected { candidate_id, .. } => {
            assert_eq!(candidate_id, Some(0));
        }
        _ => unreachable!(),
    }

    // The survivor hears the ephemeral deletion and takes over.
    match await_event(&mut b_events, |event| {
        matches!(event, ElectionEvent::LeaderChanged { .. })
    })
    .await
    {
        ElectionEvent::LeaderChanged {
            is_leader, candidate_id, ..
        } => {
            assert!(is_leader);
            assert_eq!(candidate_id, 1);
        }
        _ => unreachable!(),
    }
    assert!(b.is_leader());
    drop(a);
}

#[tokio::test]
async fn test_remove_root_after_close_uses_fresh_session() {
    let ensemble = DeterministicEnsemble::new();
    let (handle, mut events) = start_candidate(&ensemble, "/election", "candidate_");
    await_event(&mut events, |event| {
        matches!(event, ElectionEvent::LeaderChanged { is_leader: true, .. })
    })
    .await;

    handle.close();
    await_event(&mut events, |event| {
        matches!(event, ElectionEvent::ClientDisconnected { .. })
    })
    .await;

    // The root survived the close; a throwaway session deletes it.
    handle.remove_election_root();
    match await_event(&mut events, |event| {
        matches!(event, ElectionEvent::NodeRemoved { .. })
    })
    .await
    {
        ElectionEvent::NodeRemoved { path, .. } => assert_eq!(path, "/election"),
        _ => unreachable!(),
    }
    assert!(!ensemble.node_exists("/election").await);
    assert!(ensemble.session_ids().await.is_empty());
}

#[tokio::test]
async fn test_create_root_after_close_is_refused() {
    let ensemble = DeterministicEnsemble::new();
    let (handle, mut events) = start_candidate(&ensemble, "/election", "candidate_");
    await_event(&mut events, |event| {
        matches!(event, ElectionEvent::LeaderChanged { is_leader: true, .. })
    })
    .await;

    handle.close();
    await_event(&mut events, |event| {
        matches!(event, ElectionEvent::ClientDisconnected { .. })
    })
    .await;

    // Unlike remove_election_root, the forced create never bootstraps a
    // session of its own.
    handle.create_election_root();
    match next_event(&mut events).await {
        ElectionEvent::Error {
            cause: ElectionError::NotConnected { .. },
        } => {}
        other => panic!("expected NotConnected fault, got {other:?}"),
    }
    assert_no_pending_events(&mut events).await;
}

#[tokio::test]
async fn test_root_recreation_rearms_the_creation_watch() {
    let ensemble = DeterministicEnsemble::new();
    let (handle, mut events) = start_candidate(&ensemble, "/election", "candidate_");
    await_event(&mut events, |event| {
        matches!(event, ElectionEvent::LeaderChanged { is_leader: true, .. })
    })
    .await;

    // An operator session tears the group down out from under the candidate
    // and rebuilds the root.
    let (tx, _operator_notices) = mpsc::unbounded_channel();
    let operator = ensemble
        .connect(HOST, &SessionConfig::default(), tx)
        .await
        .expect("operator session");
    operator
        .remove("/election/candidate_0000000000")
        .await
        .expect("remove candidate node");
    await_event(&mut events, |event| {
        matches!(event, ElectionEvent::NodeChildrenChanged { .. })
    })
    .await;
    // Let the re-fetch triggered by the membership change settle before the
    // root disappears under it.
    assert_no_pending_events(&mut events).await;

    operator.remove("/election").await.expect("remove empty root");
    operator
        .create("/election", CreateMode::Durable)
        .await
        .expect("recreate root");

    // The creation watch re-armed by the earlier existence checks fires and
    // is re-armed again.
    match await_event(&mut events, |event| {
        matches!(event, ElectionEvent::NodeCreated { .. })
    })
    .await
    {
        ElectionEvent::NodeCreated { path } => assert_eq!(path, "/election"),
        _ => unreachable!(),
    }
    assert!(handle.is_leader());
}

#[tokio::test]
async fn test_connect_failure_is_surfaced_once() {
    let ensemble = DeterministicEnsemble::new();
    ensemble.inject_connect_failure().await;

    let (_handle, mut events) = start_candidate(&ensemble, "/election", "candidate_");
    match next_event(&mut events).await {
        ElectionEvent::Error {
            cause: ElectionError::Ensemble {
                source: EnsembleError::Connection { .. },
            },
        } => {}
        other => panic!("expected Connection fault, got {other:?}"),
    }
    assert_no_pending_events(&mut events).await;
}
