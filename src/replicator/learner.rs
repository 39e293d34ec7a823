use crate::error::{StorageError, TransportError};
use crate::replicator::{CommandOf, LearnerLog, Message, StateMachine, MAX_DATAGRAM};
use crate::types::{LogEntry, SiteId, Slot};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub struct Learner<M: StateMachine> {
    site: SiteId,
    log: LearnerLog<M>,
}

impl<M: StateMachine> Clone for Learner<M> {
    fn clone(&self) -> Self {
        Self {
            site: self.site,
            log: self.log.clone(),
        }
    }
}

impl<M: StateMachine> Learner<M> {
    pub fn new(site: SiteId, log: LearnerLog<M>) -> Self {
        Self { site, log }
    }

    /// Idempotent: a slot that is already decided keeps its value.
    pub fn learn(&self, slot: Slot, entry: LogEntry<CommandOf<M>>) -> Result<bool, StorageError> {
        let proposal_id = entry.proposal_id.clone();
        let learned = self.log.learn(slot, entry)?;
        if learned {
            info!("Learned {} at slot {}", proposal_id, slot);
        }
        Ok(learned)
    }

    /// Smallest open slot, reported to peers that are catching up.
    pub fn seek(&self) -> Slot {
        self.log.frontier()
    }

    pub fn extend_holes(&self, frontier: Slot) -> Result<usize, StorageError> {
        self.log.extend_holes(frontier)
    }

    /// Handles one datagram. Only SEEK produces a reply; commits are not
    /// acknowledged.
    pub fn handle(
        &self,
        request: Message<CommandOf<M>>,
    ) -> Result<Option<Message<CommandOf<M>>>, TransportError> {
        match request {
            Message::Commit {
                commit_val,
                log_slot,
            } => {
                debug!("Received commit of {} for slot {}", commit_val.proposal_id, log_slot);
                if let Err(e) = self.learn(log_slot, commit_val) {
                    error!("Could not learn slot {}: {}", log_slot, e);
                }
                Ok(None)
            }
            Message::Seek => {
                let cur_slot = self.seek();
                debug!("Received seek, frontier is {}", cur_slot);
                Ok(Some(Message::Ack {
                    origin: self.site,
                    cur_slot,
                }))
            }
            other => Err(TransportError::UnexpectedEvent {
                event: other.event(),
                role: "learner",
            }),
        }
    }

    /// Serves commits and seeks until `shutdown` flips. Learning flushes to
    /// disk, so each request is handled on the blocking pool.
    pub async fn serve(
        self,
        socket: UdpSocket,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), TransportError> {
        info!("Learner listening on {}", socket.local_addr()?);
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            tokio::select! {
                received = socket.recv_from(&mut buf) => {
                    let (len, from) = match received {
                        Ok(received) => received,
                        Err(e) => {
                            warn!("Learner: error while receiving: {}", e);
                            continue;
                        }
                    };
                    let handled = match Message::decode(&buf[..len]) {
                        Ok(request) => {
                            let learner = self.clone();
                            match tokio::task::spawn_blocking(move || learner.handle(request)).await {
                                Ok(handled) => handled,
                                Err(e) => {
                                    error!("Learner: handler task failed: {}", e);
                                    continue;
                                }
                            }
                        }
                        Err(e) => Err(e),
                    };
                    let reply = handled.and_then(|reply| reply.map(|m| m.encode()).transpose());
                    match reply {
                        Ok(Some(bytes)) => {
                            if let Err(e) = socket.send_to(&bytes, from).await {
                                warn!("Learner: failed to reply to {}: {}", from, e);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!("Learner: dropping request from {}: {}", from, e),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        info!("Learner stopped");
        Ok(())
    }
}
