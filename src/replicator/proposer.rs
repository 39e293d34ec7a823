use crate::error::{ProposeError, StorageError};
use crate::replicator::{
    CommandOf, Learner, Message, ProposerBallots, Replicator, Role, SiteStore, StateMachine,
    UdpNetwork,
};
use crate::types::{LogEntry, Slot};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Drives prepare and accept rounds for one slot at a time and, once a
/// majority has accepted, commits the value as the distinguished learner.
pub struct Proposer<M: StateMachine> {
    site_name: String,
    network: UdpNetwork,
    store: SiteStore<M>,
    ballots: ProposerBallots<M>,
    learner: Learner<M>,
    max_attempts: u32,
}

impl<M: StateMachine> Proposer<M> {
    pub fn new(network: UdpNetwork, store: SiteStore<M>, learner: Learner<M>) -> Self {
        let site_name = network.directory().local().name.clone();
        let max_attempts = network.timing().max_attempts.max(1);
        Self {
            site_name,
            ballots: store.proposer(),
            network,
            store,
            learner,
            max_attempts,
        }
    }

    pub fn store(&self) -> &SiteStore<M> {
        &self.store
    }

    pub async fn propose(&self, command: CommandOf<M>) -> Result<Slot, ProposeError> {
        let proposal_id = self.ballots.next_proposal_id(&self.site_name)?;
        let slot = self.ballots.next_slot();
        info!("Proposing {} at slot {}", proposal_id, slot);

        let candidate = LogEntry::new(proposal_id.clone(), command);
        match self.decide(slot, Some(candidate)).await? {
            Some(winner) if winner.proposal_id == proposal_id => Ok(slot),
            Some(winner) => {
                info!("Slot {} went to {} instead of {}", slot, winner.proposal_id, proposal_id);
                Err(ProposeError::Superseded {
                    slot,
                    winner: winner.proposal_id,
                })
            }
            None => Err(ProposeError::QuorumUnavailable {
                slot,
                attempts: self.max_attempts,
            }),
        }
    }

    /// Runs Paxos on `slot` until a value is chosen or attempts run out.
    ///
    /// With no candidate this only learns: it returns `Ok(None)` when no
    /// promising acceptor has accepted anything for the slot.
    async fn decide(
        &self,
        slot: Slot,
        candidate: Option<LogEntry<CommandOf<M>>>,
    ) -> Result<Option<LogEntry<CommandOf<M>>>, ProposeError> {
        let majority = self.network.directory().majority();
        let mut rejected = None;

        for attempt in 1..=self.max_attempts {
            let number = self.ballots.issue(slot, rejected)?;
            debug!("Sending prepare({}) to slot {}, attempt {}", number, slot, attempt);
            let promises = self
                .network
                .broadcast(
                    Role::Acceptor,
                    &Message::Prepare {
                        propose_num: number,
                        log_slot: slot,
                    },
                )
                .await?;
            rejected = rejected.max(promises.highest_rejection);
            if !promises.has_majority(majority) {
                info!("Prepare({}) for slot {} was not promised by a majority", number, slot);
                continue;
            }

            let value = match (promises.highest_accepted(slot), &candidate) {
                (Some(accepted), _) => accepted,
                (None, Some(own)) => own.clone(),
                (None, None) => return Ok(None),
            };

            debug!("Sending accept({}, {}) to slot {}", number, value.proposal_id, slot);
            let acceptances = self
                .network
                .broadcast(
                    Role::Acceptor,
                    &Message::Accept {
                        propose_num: number,
                        propose_val: value,
                        log_slot: slot,
                    },
                )
                .await?;
            rejected = rejected.max(acceptances.highest_rejection);
            if !acceptances.has_majority(majority) {
                info!("Accept({}) for slot {} was not accepted by a majority", number, slot);
                continue;
            }

            match acceptances.accepted_plurality(slot) {
                Some((winner, votes)) if votes >= majority => {
                    self.commit(slot, winner.clone()).await?;
                    return Ok(Some(winner));
                }
                _ => {
                    warn!("Acceptances for slot {} disagree, retrying", slot);
                }
            }
        }

        Err(ProposeError::QuorumUnavailable {
            slot,
            attempts: self.max_attempts,
        })
    }

    /// Learns locally, then tells every learner. Peers that miss the
    /// datagram catch up through hole filling.
    async fn commit(&self, slot: Slot, entry: LogEntry<CommandOf<M>>) -> Result<(), ProposeError> {
        self.learner.learn(slot, entry.clone())?;
        let commit = Message::Commit {
            commit_val: entry,
            log_slot: slot,
        };
        if let Err(e) = self.network.notify(Role::Learner, &commit).await {
            warn!("Failed to broadcast commit for slot {}: {}", slot, e);
        }
        Ok(())
    }

    /// Asks every learner how far its log extends, opens holes up to the
    /// furthest frontier, then fills what it can. A site far behind catches
    /// up in several passes, each bounded by `MAX_SLOT_GAP`.
    pub async fn recover(&self) -> Result<(), ProposeError> {
        let acks = self
            .network
            .broadcast::<CommandOf<M>>(Role::Learner, &Message::Seek)
            .await?;
        let target = acks.max_frontier().unwrap_or(0);
        loop {
            let before = self.learner.seek();
            if target > before {
                let opened = self.learner.extend_holes(target)?;
                info!("Peers are at slot {}, opened {} holes", target, opened);
            }
            self.fill_holes().await;
            if target <= before || self.learner.seek() <= before {
                break;
            }
        }
        Ok(())
    }

    pub async fn fill_holes(&self) {
        for slot in self.ballots.fillable_holes() {
            match self.decide(slot, None).await {
                Ok(Some(entry)) => info!("Filled hole {} with {}", slot, entry.proposal_id),
                Ok(None) => debug!("No accepted value for hole {} yet", slot),
                Err(e) => warn!("Proposal failed for slot {}: {}", slot, e),
            }
        }
    }
}

#[async_trait]
impl<M: StateMachine> Replicator for Proposer<M> {
    type Machine = M;

    async fn propose(&self, command: CommandOf<M>) -> Result<Slot, ProposeError> {
        Proposer::propose(self, command).await
    }

    async fn fill_holes(&self) {
        Proposer::fill_holes(self).await
    }

    fn snapshot(&self) -> M {
        self.store.snapshot()
    }

    fn sequence(&self) -> u64 {
        self.store.sequence()
    }

    async fn advance_sequence(&self) -> Result<u64, StorageError> {
        self.store.advance_sequence()
    }
}
