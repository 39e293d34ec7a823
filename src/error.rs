use crate::types::{ProposalId, Slot};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write config {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("config lists no sites")]
    NoSites,
    #[error("site {0} is listed more than once")]
    DuplicateSite(String),
    #[error("site {0} is not in the peer directory")]
    UnknownSite(String),
    #[error("site {site} has an invalid address {address:?}")]
    InvalidAddress { site: String, address: String },
    #[error("site {site} base port {base_port} leaves no room for the acceptor and learner ports")]
    PortOverflow { site: String, base_port: u16 },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),
    #[error("corrupt site record: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("slot {slot} is too far past the end of a {len}-slot log")]
    SlotOutOfReach { slot: Slot, len: Slot },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("encoded message is {len} bytes, larger than one datagram")]
    PayloadTooLarge { len: usize },
    #[error("unexpected {event} on the {role} port")]
    UnexpectedEvent {
        event: &'static str,
        role: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum ProposeError {
    #[error("no majority for slot {slot} after {attempts} attempts")]
    QuorumUnavailable { slot: Slot, attempts: u32 },
    #[error("slot {slot} was decided for {winner}")]
    Superseded { slot: Slot, winner: ProposalId },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
