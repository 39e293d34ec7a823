use paxlog::replicator::{Acceptance, Promise, SiteStore};
use paxlog::*;
use tempfile::TempDir;

fn create(name: &str, goal: u64) -> Action {
    Action::CreateProject {
        project_name: name.to_string(),
        funding_goal: goal,
    }
}

fn entry(site: &str, counter: u64, action: Action) -> LogEntry<Action> {
    LogEntry::new(ProposalId::new(site, counter), action)
}

fn open(storage: &LogStorage) -> SiteStore<CrowdfundState> {
    SiteStore::open(storage.clone(), 0).unwrap()
}

#[test]
fn test_empty_store() {
    let store = open(&LogStorage::temporary().unwrap());
    assert_eq!(store.frontier(), 0);
    assert_eq!(store.holes(), vec![0]);
    assert_eq!(store.sequence(), 1);
    assert!(store.snapshot().projects.is_empty());
}

#[test]
fn test_learn_applies_once() {
    let store = open(&LogStorage::temporary().unwrap());
    let learner = store.learner();

    assert!(learner.learn(0, entry("alpha", 0, create("x", 1000))).unwrap());
    assert!(!learner.learn(0, entry("beta", 0, create("y", 10))).unwrap());

    let state = store.snapshot();
    assert!(state.project("x").is_some());
    assert!(state.project("y").is_none());
    assert_eq!(store.entry(0).unwrap().proposal_id.as_str(), "alpha_0");
    assert_eq!(store.frontier(), 1);
}

#[test]
fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let storage = LogStorage::open(dir.path()).unwrap();
        let store = open(&storage);
        store.learner().learn(0, entry("alpha", 0, create("x", 1000))).unwrap();
        store.learner().learn(2, entry("beta", 0, create("y", 200))).unwrap();
        store.advance_sequence().unwrap();
        store.acceptor().prepare(5, ProposalNumber::new(4, 1)).unwrap();
    }

    let storage = LogStorage::open(dir.path()).unwrap();
    let store = open(&storage);
    assert_eq!(store.holes(), vec![1, 3]);
    assert_eq!(store.sequence(), 2);
    assert_eq!(store.snapshot().projects.len(), 2);
    assert_eq!(
        store.acceptor().slot(5).max_prepare,
        ProposalNumber::new(4, 1)
    );
}

#[test]
fn test_fresh_discards_record() {
    let storage = LogStorage::temporary().unwrap();
    open(&storage)
        .learner()
        .learn(0, entry("alpha", 0, create("x", 1000)))
        .unwrap();

    let store: SiteStore<CrowdfundState> = SiteStore::fresh(storage, 0).unwrap();
    assert_eq!(store.frontier(), 0);
    assert!(store.snapshot().projects.is_empty());
}

#[test]
fn test_prepare_then_higher_prepare_then_stale_accept() {
    let store = open(&LogStorage::temporary().unwrap());
    let slots = store.acceptor();

    let first = slots.prepare(0, ProposalNumber::new(1, 0)).unwrap();
    assert_eq!(first, Promise::Granted { accepted: None });

    let second = slots.prepare(0, ProposalNumber::new(2, 0)).unwrap();
    assert_eq!(second, Promise::Granted { accepted: None });

    let stale = slots
        .accept(0, ProposalNumber::new(1, 0), entry("alpha", 0, create("x", 1)))
        .unwrap();
    assert_eq!(
        stale,
        Acceptance::Rejected {
            max_prepare: ProposalNumber::new(2, 0)
        }
    );
    assert!(slots.slot(0).accepted.is_none());
}

#[test]
fn test_equal_prepare_is_rejected() {
    let store = open(&LogStorage::temporary().unwrap());
    let slots = store.acceptor();
    slots.prepare(0, ProposalNumber::new(3, 1)).unwrap();

    let again = slots.prepare(0, ProposalNumber::new(3, 1)).unwrap();
    assert_eq!(
        again,
        Promise::Rejected {
            max_prepare: ProposalNumber::new(3, 1)
        }
    );
}

#[test]
fn test_promise_reports_prior_acceptance() {
    let store = open(&LogStorage::temporary().unwrap());
    let slots = store.acceptor();
    let value = entry("alpha", 0, create("x", 1000));

    slots.prepare(0, ProposalNumber::new(1, 0)).unwrap();
    let accepted = slots
        .accept(0, ProposalNumber::new(1, 0), value.clone())
        .unwrap();
    assert!(matches!(accepted, Acceptance::Accepted(_)));

    match slots.prepare(0, ProposalNumber::new(2, 1)).unwrap() {
        Promise::Granted {
            accepted: Some(prior),
        } => {
            assert_eq!(prior.number, ProposalNumber::new(1, 0));
            assert_eq!(prior.value, value);
        }
        other => panic!("unexpected promise: {:?}", other),
    }
}

#[test]
fn test_acceptance_is_persisted_before_reply() {
    let dir = TempDir::new().unwrap();
    {
        let store = open(&LogStorage::open(dir.path()).unwrap());
        store
            .acceptor()
            .accept(4, ProposalNumber::new(2, 2), entry("gamma", 3, create("z", 5)))
            .unwrap();
    }
    let store = open(&LogStorage::open(dir.path()).unwrap());
    let slot = store.acceptor().slot(4);
    assert_eq!(slot.max_prepare, ProposalNumber::new(2, 2));
    assert_eq!(slot.accepted.unwrap().value.proposal_id.as_str(), "gamma_3");
}

#[test]
fn test_slots_are_independent() {
    let store = open(&LogStorage::temporary().unwrap());
    let slots = store.acceptor();
    slots.prepare(0, ProposalNumber::new(9, 0)).unwrap();

    let other = slots.prepare(1, ProposalNumber::new(1, 1)).unwrap();
    assert_eq!(other, Promise::Granted { accepted: None });
}

#[test]
fn test_issued_numbers_strictly_increase() {
    let store = open(&LogStorage::temporary().unwrap());
    let ballots = store.proposer();

    let first = ballots.issue(0, None).unwrap();
    assert_eq!(first, ProposalNumber::initial(0));
    let second = ballots.issue(0, None).unwrap();
    assert!(second > first);
    let third = ballots.issue(0, Some(ProposalNumber::new(7, 2))).unwrap();
    assert_eq!(third, ProposalNumber::new(8, 0));
    assert_eq!(ballots.last_issued(0), Some(third));

    let fresh_slot = ballots.issue(1, Some(ProposalNumber::new(4, 1))).unwrap();
    assert_eq!(fresh_slot, ProposalNumber::new(5, 0));
}

#[test]
fn test_issued_numbers_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let before = {
        let store = open(&LogStorage::open(dir.path()).unwrap());
        store.proposer().issue(0, Some(ProposalNumber::new(5, 1))).unwrap()
    };

    let store = open(&LogStorage::open(dir.path()).unwrap());
    let after = store.proposer().issue(0, None).unwrap();
    assert!(after > before);
}

#[test]
fn test_proposal_ids_are_unique() {
    let store = open(&LogStorage::temporary().unwrap());
    let ballots = store.proposer();
    let a = ballots.next_proposal_id("alpha").unwrap();
    let b = ballots.next_proposal_id("alpha").unwrap();
    assert_eq!(a.as_str(), "alpha_0");
    assert_eq!(b.as_str(), "alpha_1");
}

#[test]
fn test_fillable_holes_exclude_trailing() {
    let store = open(&LogStorage::temporary().unwrap());
    store.learner().learn(3, entry("beta", 0, create("y", 1))).unwrap();

    assert_eq!(store.proposer().fillable_holes(), vec![0, 1, 2]);
    assert_eq!(store.proposer().next_slot(), 0);
}

#[test]
fn test_extend_holes_from_peer_frontier() {
    let store = open(&LogStorage::temporary().unwrap());
    let learner = store.learner();
    learner.learn(0, entry("alpha", 0, create("x", 1))).unwrap();

    assert_eq!(learner.extend_holes(3).unwrap(), 2);
    assert_eq!(store.holes(), vec![1, 2, 3]);
    assert_eq!(store.proposer().fillable_holes(), vec![1, 2]);
    assert_eq!(learner.extend_holes(0).unwrap(), 0);
}

#[test]
fn test_erase_slot_rebuilds_view() {
    let store = open(&LogStorage::temporary().unwrap());
    store.learner().learn(0, entry("alpha", 0, create("x", 1))).unwrap();
    store.learner().learn(1, entry("alpha", 1, create("y", 1))).unwrap();

    assert!(store.erase_slot(0).unwrap());
    let state = store.snapshot();
    assert!(state.project("x").is_none());
    assert!(state.project("y").is_some());
    assert_eq!(store.frontier(), 0);
    assert!(!store.erase_slot(0).unwrap());
}
