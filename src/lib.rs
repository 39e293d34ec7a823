pub mod config;
pub mod console;
pub mod crowdfund;
pub mod daemon;
pub mod error;
pub mod replicator;
pub mod types;

pub use config::{ClusterConfig, PeerDirectory, SiteConfig, TimingConfig};
pub use crowdfund::{Action, CrowdfundService, CrowdfundState, Outcome, PLEDGE_AMOUNT};
pub use daemon::{SiteDaemon, StartOptions};
pub use error::{ConfigError, ProposeError, StorageError, TransportError};
pub use replicator::{LogStorage, Proposer, Replicator, SiteStore, StateMachine};
pub use types::*;
