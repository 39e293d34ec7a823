use paxlog::replicator::{DecisionLog, MAX_SLOT_GAP};
use paxlog::*;

fn entry(site: &str, counter: u64) -> LogEntry<String> {
    LogEntry::new(ProposalId::new(site, counter), format!("cmd-{}", counter))
}

#[test]
fn test_new_log_has_one_open_slot() {
    let log: DecisionLog<String> = DecisionLog::default();
    assert_eq!(log.len(), 1);
    assert_eq!(log.frontier(), 0);
    assert_eq!(log.trailing(), 0);
    assert!(log.holes().contains(&0));
    assert!(!log.is_decided(0));
}

#[test]
fn test_insert_in_order_advances_frontier() {
    let mut log = DecisionLog::default();
    assert!(log.insert(0, entry("alpha", 0)));
    assert!(log.insert(1, entry("alpha", 1)));

    assert_eq!(log.len(), 3);
    assert_eq!(log.frontier(), 2);
    assert_eq!(log.holes().iter().copied().collect::<Vec<_>>(), vec![2]);
}

#[test]
fn test_insert_past_end_opens_holes() {
    let mut log = DecisionLog::default();
    assert!(log.insert(3, entry("beta", 0)));

    assert_eq!(log.len(), 5);
    assert_eq!(
        log.holes().iter().copied().collect::<Vec<_>>(),
        vec![0, 1, 2, 4]
    );
    assert_eq!(log.frontier(), 0);
    assert_eq!(log.trailing(), 4);
    assert!(log.is_decided(3));
}

#[test]
fn test_insert_into_hole_keeps_length() {
    let mut log = DecisionLog::default();
    log.insert(3, entry("beta", 0));
    assert!(log.insert(1, entry("alpha", 0)));

    assert_eq!(log.len(), 5);
    assert!(!log.holes().contains(&1));
    assert_eq!(log.frontier(), 0);
}

#[test]
fn test_decided_slot_is_immutable() {
    let mut log = DecisionLog::default();
    log.insert(0, entry("alpha", 0));
    assert!(!log.insert(0, entry("beta", 7)));
    assert_eq!(log.get(0).unwrap().proposal_id.as_str(), "alpha_0");
}

#[test]
fn test_extend_holes_skips_decided_slots() {
    let mut log = DecisionLog::default();
    log.insert(0, entry("alpha", 0));

    let opened = log.extend_holes(4);
    assert_eq!(opened, 3);
    assert_eq!(
        log.holes().iter().copied().collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
    assert!(!log.holes().contains(&0));
    assert_eq!(log.trailing(), 4);
}

#[test]
fn test_extend_holes_behind_frontier_is_noop() {
    let mut log = DecisionLog::default();
    log.insert(0, entry("alpha", 0));
    log.insert(1, entry("alpha", 1));
    assert_eq!(log.extend_holes(1), 0);
    assert_eq!(log.frontier(), 2);
}

#[test]
fn test_erase_reopens_slot() {
    let mut log = DecisionLog::default();
    log.insert(0, entry("alpha", 0));
    log.insert(1, entry("alpha", 1));

    assert!(log.erase(0));
    assert!(!log.is_decided(0));
    assert_eq!(log.frontier(), 0);
    assert!(!log.erase(0));
    assert!(!log.erase(10));
}

#[test]
fn test_insert_out_of_reach_is_refused() {
    let mut log = DecisionLog::default();
    assert!(!log.within_reach(u64::MAX));
    assert!(!log.insert(u64::MAX, entry("alpha", 0)));
    assert!(!log.insert(1 << 40, entry("alpha", 1)));
    assert_eq!(log.len(), 1);

    assert!(log.within_reach(MAX_SLOT_GAP));
    assert!(log.insert(MAX_SLOT_GAP, entry("alpha", 2)));
    assert_eq!(log.len() as u64, MAX_SLOT_GAP + 2);
}

#[test]
fn test_extend_holes_is_capped() {
    let mut log: DecisionLog<String> = DecisionLog::default();
    let opened = log.extend_holes(u64::MAX);
    assert_eq!(opened as u64, MAX_SLOT_GAP + 1);
    assert_eq!(log.trailing(), MAX_SLOT_GAP + 1);
}
