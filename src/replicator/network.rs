use crate::config::{Peer, PeerDirectory, TimingConfig};
use crate::error::TransportError;
use crate::replicator::{Command, Message, QuorumCounter, RoundReplies, MAX_DATAGRAM};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Acceptor,
    Learner,
}

impl Role {
    pub fn addr(self, peer: &Peer) -> SocketAddr {
        match self {
            Role::Acceptor => peer.acceptor_addr(),
            Role::Learner => peer.learner_addr(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Role::Acceptor => "acceptor",
            Role::Learner => "learner",
        }
    }
}

fn unspecified_for(ip: IpAddr, port: u16) -> SocketAddr {
    match ip {
        IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port),
    }
}

/// Binds the well-known port `role` listens on for `peer`, on every interface.
pub async fn bind_role(peer: &Peer, role: Role) -> Result<UdpSocket, TransportError> {
    let addr = unspecified_for(peer.ip, role.addr(peer).port());
    UdpSocket::bind(addr)
        .await
        .map_err(|source| TransportError::Bind { addr, source })
}

/// Datagram fan-out to every site in the directory, this one included.
#[derive(Clone)]
pub struct UdpNetwork {
    directory: Arc<PeerDirectory>,
    timing: TimingConfig,
}

impl UdpNetwork {
    pub fn new(directory: Arc<PeerDirectory>, timing: TimingConfig) -> Self {
        Self { directory, timing }
    }

    pub fn directory(&self) -> &PeerDirectory {
        &self.directory
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// Sends `request` to `role` on every site and gathers replies until a
    /// majority has granted or the round deadline passes. Sites that stay
    /// silent past the per-peer timeout are left out of the round.
    pub async fn broadcast<C: Command>(
        &self,
        role: Role,
        request: &Message<C>,
    ) -> Result<RoundReplies<C>, TransportError> {
        let payload = Arc::new(request.encode()?);
        let majority = self.directory.majority();
        let counter = Arc::new(QuorumCounter::new(majority));
        let (tx, mut rx) = mpsc::unbounded_channel();

        for peer in self.directory.peers() {
            let addr = role.addr(peer);
            let payload = payload.clone();
            let counter = counter.clone();
            let tx = tx.clone();
            let peer_timeout = self.timing.peer_timeout();
            tokio::spawn(async move {
                match exchange::<C>(addr, &payload, &counter, peer_timeout).await {
                    Ok(Some(reply)) => {
                        let _ = tx.send(reply);
                    }
                    Ok(None) => {}
                    Err(e) => debug!("No usable reply from {}: {}", addr, e),
                }
            });
        }
        drop(tx);

        let deadline = Instant::now() + self.timing.round_deadline();
        let mut replies = RoundReplies::default();
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(reply)) => {
                    replies.push(reply);
                    if replies.has_majority(majority) {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    debug!("{} round deadline passed", request.event());
                    break;
                }
            }
        }

        if !replies.has_majority(majority) {
            warn!(
                "{} to {}s: {} of {} needed replies",
                request.event(),
                role.name(),
                replies.granted.len(),
                majority
            );
        }
        Ok(replies)
    }

    /// Fire-and-forget delivery of `message` to `role` on every site.
    pub async fn notify<C: Command>(
        &self,
        role: Role,
        message: &Message<C>,
    ) -> Result<(), TransportError> {
        let payload = message.encode()?;
        let local = self.directory.local();
        let socket = UdpSocket::bind(unspecified_for(local.ip, 0)).await?;
        for peer in self.directory.peers() {
            let addr = role.addr(peer);
            if let Err(e) = socket.send_to(&payload, addr).await {
                warn!("Failed to send {} to {}: {}", message.event(), addr, e);
            }
        }
        Ok(())
    }
}

async fn exchange<C: Command>(
    addr: SocketAddr,
    payload: &[u8],
    counter: &QuorumCounter,
    peer_timeout: Duration,
) -> Result<Option<Message<C>>, TransportError> {
    let socket = UdpSocket::bind(unspecified_for(addr.ip(), 0)).await?;
    socket.connect(addr).await?;
    socket.send(payload).await?;

    if counter.reached() {
        return Ok(None);
    }

    let mut buf = vec![0u8; MAX_DATAGRAM];
    let len = match tokio::time::timeout(peer_timeout, socket.recv(&mut buf)).await {
        Ok(received) => received?,
        Err(_) => return Ok(None),
    };
    let reply = Message::decode(&buf[..len])?;
    if !reply.is_nack() {
        counter.record();
    }
    Ok(Some(reply))
}
