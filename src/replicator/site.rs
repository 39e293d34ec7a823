//! Durable per-site state and the narrow views each Paxos role gets of it.
//!
//! `SiteStore` owns the only copy of a site's `SiteRecord` behind a mutex.
//! The acceptor, learner and proposer each receive a capability
//! (`AcceptorSlots`, `LearnerLog`, `ProposerBallots`) exposing just the
//! operations that role performs. Every mutation is written to storage
//! before it becomes visible in memory.

use crate::error::StorageError;
use crate::replicator::{CommandOf, LogStorage, StateMachine};
use crate::types::{LogEntry, ProposalId, ProposalNumber, SiteId, Slot};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// How far past the end of the local log a learned slot or a peer's
/// frontier may reach. Anything further is refused.
pub const MAX_SLOT_GAP: Slot = 4096;

/// Ordered slots, each decided or absent, plus the set of known holes.
///
/// The last allocated slot is always absent and always a hole: it is where
/// the next proposal goes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionLog<C> {
    entries: Vec<Option<LogEntry<C>>>,
    holes: BTreeSet<Slot>,
}

impl<C> Default for DecisionLog<C> {
    fn default() -> Self {
        Self {
            entries: vec![None],
            holes: BTreeSet::from([0]),
        }
    }
}

impl<C> DecisionLog<C> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, slot: Slot) -> Option<&LogEntry<C>> {
        self.entries.get(slot as usize).and_then(Option::as_ref)
    }

    pub fn is_decided(&self, slot: Slot) -> bool {
        self.get(slot).is_some()
    }

    pub fn entries(&self) -> &[Option<LogEntry<C>>] {
        &self.entries
    }

    pub fn holes(&self) -> &BTreeSet<Slot> {
        &self.holes
    }

    /// Lowest open slot: where this site's next proposal goes, and what it
    /// reports to peers seeking to catch up.
    pub fn frontier(&self) -> Slot {
        self.holes
            .first()
            .copied()
            .unwrap_or(self.entries.len() as Slot - 1)
    }

    /// Highest known hole. Always open, never filled by recovery.
    pub fn trailing(&self) -> Slot {
        self.holes
            .last()
            .copied()
            .unwrap_or(self.entries.len() as Slot - 1)
    }

    /// True if `slot` lies within `MAX_SLOT_GAP` of the end of the log.
    pub fn within_reach(&self, slot: Slot) -> bool {
        slot <= (self.entries.len() as Slot).saturating_add(MAX_SLOT_GAP)
    }

    /// Places `entry` at `slot`, growing the log and opening holes for any
    /// skipped slots. Returns false and changes nothing if `slot` is already
    /// decided or out of reach.
    pub fn insert(&mut self, slot: Slot, entry: LogEntry<C>) -> bool {
        if self.is_decided(slot) || !self.within_reach(slot) {
            return false;
        }
        let index = slot as usize;
        if index + 1 >= self.entries.len() {
            for hole in self.entries.len()..index + 2 {
                if hole != index {
                    self.holes.insert(hole as Slot);
                }
            }
            self.entries.resize_with(index + 2, || None);
        }
        self.holes.remove(&slot);
        self.entries[index] = Some(entry);
        true
    }

    /// Marks every undecided slot after the local frontier, up to and
    /// including `frontier`, as a hole. Stops at `MAX_SLOT_GAP` past the end
    /// of the log; callers catch up the rest in later passes.
    pub fn extend_holes(&mut self, frontier: Slot) -> usize {
        let limit = (self.entries.len() as Slot).saturating_add(MAX_SLOT_GAP);
        let start = self.frontier() + 1;
        let mut opened = 0;
        for slot in start..=frontier.min(limit) {
            if !self.is_decided(slot) && self.holes.insert(slot) {
                opened += 1;
            }
        }
        opened
    }

    /// Debug-only: forgets the decision at `slot` so it can be re-learned.
    pub fn erase(&mut self, slot: Slot) -> bool {
        match self.entries.get_mut(slot as usize) {
            Some(entry @ Some(_)) => {
                *entry = None;
                self.holes.insert(slot);
                true
            }
            _ => false,
        }
    }
}

/// What one acceptor remembers about one slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcceptorSlot<C> {
    pub max_prepare: ProposalNumber,
    pub accepted: Option<Accepted<C>>,
}

impl<C> Default for AcceptorSlot<C> {
    fn default() -> Self {
        Self {
            max_prepare: ProposalNumber::ZERO,
            accepted: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Accepted<C> {
    pub number: ProposalNumber,
    pub value: LogEntry<C>,
}

/// Everything a site must not lose across a restart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteRecord<C> {
    pub log: DecisionLog<C>,
    pub acceptor_slots: BTreeMap<Slot, AcceptorSlot<C>>,
    /// Highest proposal number this site has issued, per slot.
    pub ballots: BTreeMap<Slot, ProposalNumber>,
    pub proposal_counter: u64,
    /// Application sequence (pledge ids). Starts at 1.
    pub sequence_counter: u64,
}

impl<C> Default for SiteRecord<C> {
    fn default() -> Self {
        Self {
            log: DecisionLog::default(),
            acceptor_slots: BTreeMap::new(),
            ballots: BTreeMap::new(),
            proposal_counter: 0,
            sequence_counter: 1,
        }
    }
}

impl<C> SiteRecord<C> {
    /// Rebuilds the aggregate by replaying every decided entry in slot order.
    pub fn replay<M>(&self) -> M
    where
        M: StateMachine<Command = C>,
    {
        let mut machine = M::default();
        for (slot, entry) in self.log.entries().iter().enumerate() {
            if let Some(entry) = entry {
                machine.apply(slot as Slot, entry);
            }
        }
        machine
    }
}

struct SiteState<M: StateMachine> {
    record: SiteRecord<M::Command>,
    machine: M,
}

/// Lock-protected store shared by the three roles of one site.
pub struct SiteStore<M: StateMachine> {
    site: SiteId,
    inner: Arc<Mutex<SiteState<M>>>,
    storage: LogStorage,
}

impl<M: StateMachine> Clone for SiteStore<M> {
    fn clone(&self) -> Self {
        Self {
            site: self.site,
            inner: self.inner.clone(),
            storage: self.storage.clone(),
        }
    }
}

impl<M: StateMachine> SiteStore<M> {
    /// Loads the persisted record, or starts an empty log if there is none.
    pub fn open(storage: LogStorage, site: SiteId) -> Result<Self, StorageError> {
        let record = match storage.load::<SiteRecord<M::Command>>()? {
            Some(record) => {
                info!(
                    "Site {} loaded {} slots, frontier {}",
                    site,
                    record.log.len(),
                    record.log.frontier()
                );
                record
            }
            None => {
                let record = SiteRecord::default();
                storage.save(&record)?;
                info!("Site {} started with an empty log", site);
                record
            }
        };
        let machine: M = record.replay();
        Ok(Self {
            site,
            inner: Arc::new(Mutex::new(SiteState { record, machine })),
            storage,
        })
    }

    /// Discards anything persisted and starts from an empty log.
    pub fn fresh(storage: LogStorage, site: SiteId) -> Result<Self, StorageError> {
        storage.clear()?;
        Self::open(storage, site)
    }

    pub fn site(&self) -> SiteId {
        self.site
    }

    fn lock(&self) -> MutexGuard<'_, SiteState<M>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist<R>(
        &self,
        state: &mut SiteState<M>,
        change: impl FnOnce(&mut SiteRecord<M::Command>) -> R,
    ) -> Result<R, StorageError> {
        let mut next = state.record.clone();
        let result = change(&mut next);
        self.storage.save(&next)?;
        state.record = next;
        Ok(result)
    }

    pub fn snapshot(&self) -> M {
        self.lock().machine.clone()
    }

    pub fn record(&self) -> SiteRecord<M::Command> {
        self.lock().record.clone()
    }

    pub fn frontier(&self) -> Slot {
        self.lock().record.log.frontier()
    }

    pub fn holes(&self) -> Vec<Slot> {
        self.lock().record.log.holes().iter().copied().collect()
    }

    pub fn entry(&self, slot: Slot) -> Option<LogEntry<M::Command>> {
        self.lock().record.log.get(slot).cloned()
    }

    pub fn log(&self) -> Vec<Option<LogEntry<M::Command>>> {
        self.lock().record.log.entries().to_vec()
    }

    pub fn sequence(&self) -> u64 {
        self.lock().record.sequence_counter
    }

    pub fn advance_sequence(&self) -> Result<u64, StorageError> {
        let mut state = self.lock();
        self.persist(&mut state, |record| {
            record.sequence_counter += 1;
            record.sequence_counter
        })
    }

    /// Debug-only slot erasure. Acceptor bookkeeping is kept, so hole
    /// filling can re-learn the value.
    pub fn erase_slot(&self, slot: Slot) -> Result<bool, StorageError> {
        let mut state = self.lock();
        let erased = self.persist(&mut state, |record| record.log.erase(slot))?;
        if erased {
            state.machine = state.record.replay();
            info!("Erased slot {}", slot);
        }
        Ok(erased)
    }

    pub fn acceptor(&self) -> AcceptorSlots<M> {
        AcceptorSlots(self.clone())
    }

    pub fn learner(&self) -> LearnerLog<M> {
        LearnerLog(self.clone())
    }

    pub fn proposer(&self) -> ProposerBallots<M> {
        ProposerBallots(self.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Promise<C> {
    Granted { accepted: Option<Accepted<C>> },
    Rejected { max_prepare: ProposalNumber },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Acceptance<C> {
    Accepted(Accepted<C>),
    Rejected { max_prepare: ProposalNumber },
}

/// Acceptor capability: per-slot promise and acceptance bookkeeping.
pub struct AcceptorSlots<M: StateMachine>(SiteStore<M>);

impl<M: StateMachine> Clone for AcceptorSlots<M> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<M: StateMachine> AcceptorSlots<M> {
    pub fn slot(&self, slot: Slot) -> AcceptorSlot<CommandOf<M>> {
        self.0
            .lock()
            .record
            .acceptor_slots
            .get(&slot)
            .cloned()
            .unwrap_or_default()
    }

    pub fn prepare(
        &self,
        slot: Slot,
        number: ProposalNumber,
    ) -> Result<Promise<CommandOf<M>>, StorageError> {
        let mut state = self.0.lock();
        let current = state
            .record
            .acceptor_slots
            .get(&slot)
            .cloned()
            .unwrap_or_default();
        if number <= current.max_prepare {
            return Ok(Promise::Rejected {
                max_prepare: current.max_prepare,
            });
        }
        self.0.persist(&mut state, |record| {
            record.acceptor_slots.entry(slot).or_default().max_prepare = number;
        })?;
        Ok(Promise::Granted {
            accepted: current.accepted,
        })
    }

    pub fn accept(
        &self,
        slot: Slot,
        number: ProposalNumber,
        value: LogEntry<CommandOf<M>>,
    ) -> Result<Acceptance<CommandOf<M>>, StorageError> {
        let mut state = self.0.lock();
        let max_prepare = state
            .record
            .acceptor_slots
            .get(&slot)
            .map_or(ProposalNumber::ZERO, |s| s.max_prepare);
        if number < max_prepare {
            return Ok(Acceptance::Rejected { max_prepare });
        }
        let accepted = Accepted { number, value };
        let stored = accepted.clone();
        self.0.persist(&mut state, move |record| {
            let entry = record.acceptor_slots.entry(slot).or_default();
            entry.max_prepare = number;
            entry.accepted = Some(stored);
        })?;
        Ok(Acceptance::Accepted(accepted))
    }
}

/// Learner capability: appends decided values and reports the frontier.
pub struct LearnerLog<M: StateMachine>(SiteStore<M>);

impl<M: StateMachine> Clone for LearnerLog<M> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<M: StateMachine> LearnerLog<M> {
    /// Records `entry` as decided at `slot` and applies it to the aggregate.
    ///
    /// Returns false without touching anything if the slot was already decided.
    pub fn learn(&self, slot: Slot, entry: LogEntry<CommandOf<M>>) -> Result<bool, StorageError> {
        let mut state = self.0.lock();
        if !state.record.log.within_reach(slot) {
            return Err(StorageError::SlotOutOfReach {
                slot,
                len: state.record.log.len() as Slot,
            });
        }
        if state.record.log.is_decided(slot) {
            debug!("Slot {} already decided, ignoring commit", slot);
            return Ok(false);
        }
        let applied = entry.clone();
        self.0
            .persist(&mut state, move |record| record.log.insert(slot, entry))?;
        state.machine.apply(slot, &applied);
        Ok(true)
    }

    pub fn frontier(&self) -> Slot {
        self.0.frontier()
    }

    pub fn is_decided(&self, slot: Slot) -> bool {
        self.0.lock().record.log.is_decided(slot)
    }

    /// Opens holes for slots a peer reports beyond the local frontier.
    pub fn extend_holes(&self, frontier: Slot) -> Result<usize, StorageError> {
        let mut state = self.0.lock();
        if frontier <= state.record.log.frontier() {
            return Ok(0);
        }
        self.0
            .persist(&mut state, |record| record.log.extend_holes(frontier))
    }
}

/// Proposer capability: proposal numbers, proposal ids and target slots.
pub struct ProposerBallots<M: StateMachine>(SiteStore<M>);

impl<M: StateMachine> Clone for ProposerBallots<M> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<M: StateMachine> ProposerBallots<M> {
    /// Highest number issued for `slot` so far, if any.
    pub fn last_issued(&self, slot: Slot) -> Option<ProposalNumber> {
        self.0.lock().record.ballots.get(&slot).copied()
    }

    /// Issues a number for `slot` above everything issued before and above
    /// `rejected`, and persists it before handing it out.
    pub fn issue(
        &self,
        slot: Slot,
        rejected: Option<ProposalNumber>,
    ) -> Result<ProposalNumber, StorageError> {
        let site = self.0.site;
        let mut state = self.0.lock();
        let next = match (state.record.ballots.get(&slot).copied(), rejected) {
            (Some(last), rejected) => last.outbid(rejected, site),
            (None, Some(rejected)) if rejected >= ProposalNumber::initial(site) => {
                rejected.outbid(None, site)
            }
            (None, _) => ProposalNumber::initial(site),
        };
        self.0.persist(&mut state, |record| {
            record.ballots.insert(slot, next);
        })?;
        Ok(next)
    }

    pub fn next_proposal_id(&self, site_name: &str) -> Result<ProposalId, StorageError> {
        let mut state = self.0.lock();
        self.0.persist(&mut state, |record| {
            let id = ProposalId::new(site_name, record.proposal_counter);
            record.proposal_counter += 1;
            id
        })
    }

    pub fn next_slot(&self) -> Slot {
        self.0.frontier()
    }

    /// Every hole except the trailing one, lowest first.
    pub fn fillable_holes(&self) -> Vec<Slot> {
        let state = self.0.lock();
        let log = &state.record.log;
        let trailing = log.trailing();
        log.holes().iter().copied().filter(|s| *s < trailing).collect()
    }
}
