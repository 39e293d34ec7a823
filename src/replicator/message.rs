use crate::error::TransportError;
use crate::replicator::Accepted;
use crate::types::{LogEntry, ProposalNumber, SiteId, Slot};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Largest datagram any role reads or writes.
pub const MAX_DATAGRAM: usize = 32 * 1024;

/// One datagram on the wire, tagged by `event`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message<C> {
    Prepare {
        propose_num: ProposalNumber,
        log_slot: Slot,
    },
    Promise {
        origin: SiteId,
        log_slot: Slot,
        accepted_num: Option<ProposalNumber>,
        accepted_val: Option<LogEntry<C>>,
    },
    Accept {
        propose_num: ProposalNumber,
        propose_val: LogEntry<C>,
        log_slot: Slot,
    },
    Accepted {
        origin: SiteId,
        log_slot: Slot,
        accepted_num: ProposalNumber,
        accepted_val: LogEntry<C>,
    },
    Ack {
        origin: SiteId,
        cur_slot: Slot,
    },
    Nack {
        origin: SiteId,
        log_slot: Slot,
        max_num: ProposalNumber,
    },
    Commit {
        commit_val: LogEntry<C>,
        log_slot: Slot,
    },
    Seek,
}

impl<C> Message<C> {
    pub fn event(&self) -> &'static str {
        match self {
            Message::Prepare { .. } => "PREPARE",
            Message::Promise { .. } => "PROMISE",
            Message::Accept { .. } => "ACCEPT",
            Message::Accepted { .. } => "ACCEPTED",
            Message::Ack { .. } => "ACK",
            Message::Nack { .. } => "NACK",
            Message::Commit { .. } => "COMMIT",
            Message::Seek => "SEEK",
        }
    }

    pub fn is_nack(&self) -> bool {
        matches!(self, Message::Nack { .. })
    }

    pub fn promise(origin: SiteId, log_slot: Slot, accepted: Option<Accepted<C>>) -> Self {
        let (accepted_num, accepted_val) = match accepted {
            Some(a) => (Some(a.number), Some(a.value)),
            None => (None, None),
        };
        Message::Promise {
            origin,
            log_slot,
            accepted_num,
            accepted_val,
        }
    }
}

impl<C: Serialize> Message<C> {
    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        let bytes = serde_json::to_vec(self)?;
        if bytes.len() > MAX_DATAGRAM {
            return Err(TransportError::PayloadTooLarge { len: bytes.len() });
        }
        Ok(bytes)
    }
}

impl<C: DeserializeOwned> Message<C> {
    pub fn decode(bytes: &[u8]) -> Result<Self, TransportError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
