use crate::replicator::Message;
use crate::types::{LogEntry, ProposalNumber, Slot};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts replies that move a round toward its majority.
///
/// Shared between the per-peer workers of one round. A worker that sees the
/// target already reached skips waiting for its own reply.
#[derive(Debug)]
pub struct QuorumCounter {
    count: AtomicUsize,
    target: usize,
}

impl QuorumCounter {
    pub fn new(target: usize) -> Self {
        Self {
            count: AtomicUsize::new(0),
            target,
        }
    }

    /// Records one contributing reply. Returns true once the target is met.
    pub fn record(&self) -> bool {
        self.count.fetch_add(1, Ordering::AcqRel) + 1 >= self.target
    }

    pub fn reached(&self) -> bool {
        self.count.load(Ordering::Acquire) >= self.target
    }
}

/// Replies gathered by one broadcast round.
#[derive(Debug, Clone)]
pub struct RoundReplies<C> {
    pub granted: Vec<Message<C>>,
    pub highest_rejection: Option<ProposalNumber>,
}

impl<C> Default for RoundReplies<C> {
    fn default() -> Self {
        Self {
            granted: Vec::new(),
            highest_rejection: None,
        }
    }
}

impl<C: Clone> RoundReplies<C> {
    pub fn push(&mut self, reply: Message<C>) {
        match reply {
            Message::Nack { max_num, .. } => {
                self.highest_rejection = Some(match self.highest_rejection {
                    Some(current) => current.max(max_num),
                    None => max_num,
                });
            }
            other => self.granted.push(other),
        }
    }

    pub fn has_majority(&self, majority: usize) -> bool {
        self.granted.len() >= majority
    }

    /// Among the promises for `slot`, the value accepted under the highest
    /// number. `None` when no promising acceptor had accepted anything.
    pub fn highest_accepted(&self, slot: Slot) -> Option<LogEntry<C>> {
        self.granted
            .iter()
            .filter_map(|reply| match reply {
                Message::Promise {
                    log_slot,
                    accepted_num: Some(number),
                    accepted_val: Some(value),
                    ..
                } if *log_slot == slot => Some((*number, value)),
                _ => None,
            })
            .max_by_key(|(number, _)| *number)
            .map(|(_, value)| value.clone())
    }

    /// Plurality vote over the accepted numbers reported for `slot`.
    /// Returns the winning value and how many acceptors reported it.
    pub fn accepted_plurality(&self, slot: Slot) -> Option<(LogEntry<C>, usize)> {
        let mut tally: HashMap<ProposalNumber, (usize, &LogEntry<C>)> = HashMap::new();
        for reply in &self.granted {
            if let Message::Accepted {
                log_slot,
                accepted_num,
                accepted_val,
                ..
            } = reply
            {
                if *log_slot == slot {
                    tally.entry(*accepted_num).or_insert((0, accepted_val)).0 += 1;
                }
            }
        }
        tally
            .into_values()
            .max_by_key(|(count, _)| *count)
            .map(|(count, value)| (value.clone(), count))
    }

    /// Largest `cur_slot` among seek acknowledgements.
    pub fn max_frontier(&self) -> Option<Slot> {
        self.granted
            .iter()
            .filter_map(|reply| match reply {
                Message::Ack { cur_slot, .. } => Some(*cur_slot),
                _ => None,
            })
            .max()
    }
}
