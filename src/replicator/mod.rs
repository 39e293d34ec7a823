mod acceptor;
mod learner;
mod message;
mod network;
mod proposer;
mod quorum;
mod site;
mod storage;

pub use acceptor::*;
pub use learner::*;
pub use message::*;
pub use network::*;
pub use proposer::*;
pub use quorum::*;
pub use site::*;
pub use storage::*;

use crate::error::{ProposeError, StorageError};
use crate::types::{LogEntry, Slot};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Application value carried by a log entry.
pub trait Command:
    Clone + std::fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> Command for T where
    T: Clone + std::fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Aggregate state derived from the decision log.
///
/// `apply` runs exactly once per newly learned entry. Entries may arrive out
/// of slot order while a site is catching up.
pub trait StateMachine: Default + Clone + Send + Sync + 'static {
    type Command: Command;

    fn apply(&mut self, slot: Slot, entry: &LogEntry<Self::Command>);
}

pub type CommandOf<M> = <M as StateMachine>::Command;

#[async_trait]
pub trait Replicator: Send + Sync {
    type Machine: StateMachine;

    /// Runs Paxos for the next open slot. Succeeds only if this call's value won it.
    async fn propose(&self, command: CommandOf<Self::Machine>) -> Result<Slot, ProposeError>;

    /// Re-derives already decided values for every hole below the trailing slot.
    async fn fill_holes(&self);

    fn snapshot(&self) -> Self::Machine;

    fn sequence(&self) -> u64;

    async fn advance_sequence(&self) -> Result<u64, StorageError>;
}
