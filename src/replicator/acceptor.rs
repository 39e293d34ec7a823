use crate::error::TransportError;
use crate::replicator::{
    Acceptance, AcceptorSlots, CommandOf, Message, Promise, StateMachine, MAX_DATAGRAM,
};
use crate::types::SiteId;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Answers PREPARE and ACCEPT for any slot. Slots never interact.
pub struct Acceptor<M: StateMachine> {
    site: SiteId,
    slots: AcceptorSlots<M>,
}

impl<M: StateMachine> Clone for Acceptor<M> {
    fn clone(&self) -> Self {
        Self {
            site: self.site,
            slots: self.slots.clone(),
        }
    }
}

impl<M: StateMachine> Acceptor<M> {
    pub fn new(site: SiteId, slots: AcceptorSlots<M>) -> Self {
        Self { site, slots }
    }

    /// Produces the reply to one request, or an error if the request is not
    /// for an acceptor or its effect could not be persisted.
    pub fn handle(
        &self,
        request: Message<CommandOf<M>>,
    ) -> Result<Message<CommandOf<M>>, anyhow::Error> {
        match request {
            Message::Prepare {
                propose_num,
                log_slot,
            } => {
                debug!("Received prepare({}) for slot {}", propose_num, log_slot);
                let reply = match self.slots.prepare(log_slot, propose_num)? {
                    Promise::Granted { accepted } => {
                        debug!(
                            "Promise({}) at slot {}, previously accepted {:?}",
                            propose_num,
                            log_slot,
                            accepted.as_ref().map(|a| a.number)
                        );
                        Message::promise(self.site, log_slot, accepted)
                    }
                    Promise::Rejected { max_prepare } => {
                        debug!("Nack({}) at slot {}", max_prepare, log_slot);
                        Message::Nack {
                            origin: self.site,
                            log_slot,
                            max_num: max_prepare,
                        }
                    }
                };
                Ok(reply)
            }
            Message::Accept {
                propose_num,
                propose_val,
                log_slot,
            } => {
                debug!("Received accept({}) for slot {}", propose_num, log_slot);
                let reply = match self.slots.accept(log_slot, propose_num, propose_val)? {
                    Acceptance::Accepted(accepted) => {
                        debug!(
                            "Accepted({}, {}) at slot {}",
                            accepted.number, accepted.value.proposal_id, log_slot
                        );
                        Message::Accepted {
                            origin: self.site,
                            log_slot,
                            accepted_num: accepted.number,
                            accepted_val: accepted.value,
                        }
                    }
                    Acceptance::Rejected { max_prepare } => {
                        debug!(
                            "Can't accept proposal {} at slot {}, promised {}",
                            propose_num, log_slot, max_prepare
                        );
                        Message::Nack {
                            origin: self.site,
                            log_slot,
                            max_num: max_prepare,
                        }
                    }
                };
                Ok(reply)
            }
            other => Err(TransportError::UnexpectedEvent {
                event: other.event(),
                role: "acceptor",
            }
            .into()),
        }
    }

    /// Serves requests until `shutdown` flips. Bad datagrams are logged and
    /// dropped without a reply.
    ///
    /// `handle` flushes to disk before it returns, so it runs on the blocking
    /// pool rather than on a runtime worker.
    pub async fn serve(
        self,
        socket: UdpSocket,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), TransportError> {
        info!("Acceptor listening on {}", socket.local_addr()?);
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            tokio::select! {
                received = socket.recv_from(&mut buf) => {
                    let (len, from) = match received {
                        Ok(received) => received,
                        Err(e) => {
                            warn!("Acceptor: error while receiving: {}", e);
                            continue;
                        }
                    };
                    let handled = match Message::decode(&buf[..len]) {
                        Ok(request) => {
                            let acceptor = self.clone();
                            tokio::task::spawn_blocking(move || acceptor.handle(request))
                                .await
                                .map_err(anyhow::Error::from)
                                .and_then(|reply| reply)
                        }
                        Err(e) => Err(e.into()),
                    };
                    let reply = handled
                        .and_then(|reply| reply.encode().map_err(anyhow::Error::from));
                    match reply {
                        Ok(bytes) => {
                            if let Err(e) = socket.send_to(&bytes, from).await {
                                warn!("Acceptor: failed to reply to {}: {}", from, e);
                            }
                        }
                        Err(e) => warn!("Acceptor: dropping request from {}: {}", from, e),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        info!("Acceptor stopped");
        Ok(())
    }
}
