use paxlog::replicator::{Message, RoundReplies, MAX_DATAGRAM};
use paxlog::*;
use serde_json::json;

fn value(site: &str, counter: u64) -> LogEntry<Action> {
    LogEntry::new(
        ProposalId::new(site, counter),
        Action::CancelProject {
            project_name: "x".to_string(),
        },
    )
}

#[test]
fn test_prepare_wire_format() {
    let msg: Message<Action> = Message::Prepare {
        propose_num: ProposalNumber::new(2, 1),
        log_slot: 7,
    };
    let encoded: serde_json::Value = serde_json::from_slice(&msg.encode().unwrap()).unwrap();
    assert_eq!(
        encoded,
        json!({
            "event": "PREPARE",
            "propose_num": {"epoch": 2, "site": 1},
            "log_slot": 7
        })
    );
}

#[test]
fn test_commit_wire_format() {
    let msg = Message::Commit {
        commit_val: value("beta", 3),
        log_slot: 1,
    };
    let encoded: serde_json::Value = serde_json::from_slice(&msg.encode().unwrap()).unwrap();
    assert_eq!(
        encoded,
        json!({
            "event": "COMMIT",
            "commit_val": {
                "proposal_id": "beta_3",
                "command": {"action": "CANCEL_PROJECT", "project_name": "x"}
            },
            "log_slot": 1
        })
    );
}

#[test]
fn test_seek_wire_format() {
    let bytes = Message::<Action>::Seek.encode().unwrap();
    assert_eq!(bytes, br#"{"event":"SEEK"}"#.to_vec());
    let decoded = Message::<Action>::decode(&bytes).unwrap();
    assert_eq!(decoded, Message::Seek);
}

#[test]
fn test_promise_without_acceptance_uses_nulls() {
    let msg: Message<Action> = Message::promise(2, 4, None);
    let encoded: serde_json::Value = serde_json::from_slice(&msg.encode().unwrap()).unwrap();
    assert_eq!(encoded["accepted_num"], serde_json::Value::Null);
    assert_eq!(encoded["accepted_val"], serde_json::Value::Null);
    assert_eq!(encoded["origin"], 2);
}

#[test]
fn test_decode_rejects_garbage() {
    assert!(Message::<Action>::decode(b"not json").is_err());
    assert!(Message::<Action>::decode(br#"{"event":"BOGUS"}"#).is_err());
}

#[test]
fn test_oversized_message_is_refused() {
    let msg = Message::Commit {
        commit_val: LogEntry::new(
            ProposalId::new("alpha", 0),
            Action::CancelProject {
                project_name: "x".repeat(MAX_DATAGRAM),
            },
        ),
        log_slot: 0,
    };
    assert!(matches!(
        msg.encode(),
        Err(TransportError::PayloadTooLarge { .. })
    ));
}

#[test]
fn test_round_replies_track_highest_rejection() {
    let mut replies: RoundReplies<Action> = RoundReplies::default();
    replies.push(Message::Nack {
        origin: 0,
        log_slot: 0,
        max_num: ProposalNumber::new(3, 0),
    });
    replies.push(Message::Nack {
        origin: 1,
        log_slot: 0,
        max_num: ProposalNumber::new(5, 1),
    });
    replies.push(Message::promise(2, 0, None));

    assert_eq!(replies.highest_rejection, Some(ProposalNumber::new(5, 1)));
    assert_eq!(replies.granted.len(), 1);
    assert!(!replies.has_majority(2));
    assert!(replies.has_majority(1));
}

#[test]
fn test_highest_accepted_value_wins() {
    let mut replies = RoundReplies::default();
    replies.push(Message::Promise {
        origin: 0,
        log_slot: 2,
        accepted_num: Some(ProposalNumber::new(1, 0)),
        accepted_val: Some(value("alpha", 0)),
    });
    replies.push(Message::Promise {
        origin: 1,
        log_slot: 2,
        accepted_num: Some(ProposalNumber::new(4, 2)),
        accepted_val: Some(value("gamma", 1)),
    });
    replies.push(Message::promise(2, 2, None));

    let chosen = replies.highest_accepted(2).unwrap();
    assert_eq!(chosen.proposal_id.as_str(), "gamma_1");
    assert!(replies.highest_accepted(3).is_none());
}

#[test]
fn test_accepted_plurality() {
    let mut replies = RoundReplies::default();
    for origin in 0..2 {
        replies.push(Message::Accepted {
            origin,
            log_slot: 0,
            accepted_num: ProposalNumber::new(2, 1),
            accepted_val: value("beta", 0),
        });
    }
    replies.push(Message::Accepted {
        origin: 2,
        log_slot: 0,
        accepted_num: ProposalNumber::new(1, 0),
        accepted_val: value("alpha", 0),
    });

    let (winner, votes) = replies.accepted_plurality(0).unwrap();
    assert_eq!(winner.proposal_id.as_str(), "beta_0");
    assert_eq!(votes, 2);
}

#[test]
fn test_max_frontier_from_acks() {
    let mut replies: RoundReplies<Action> = RoundReplies::default();
    assert_eq!(replies.max_frontier(), None);
    replies.push(Message::Ack {
        origin: 0,
        cur_slot: 2,
    });
    replies.push(Message::Ack {
        origin: 1,
        cur_slot: 5,
    });
    assert_eq!(replies.max_frontier(), Some(5));
}
