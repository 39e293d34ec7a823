use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a site in the peer directory. Breaks ties between proposal numbers.
pub type SiteId = u32;

/// Index into the replicated decision log. Every slot is its own Paxos instance.
pub type Slot = u64;

/// Totally ordered ballot: epoch first, then the proposing site.
///
/// Displayed as `epoch.site`, so `3.1` is epoch 3 issued by site 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ProposalNumber {
    pub epoch: u64,
    pub site: SiteId,
}

impl ProposalNumber {
    /// What an acceptor has promised before it has seen any prepare for a slot.
    pub const ZERO: ProposalNumber = ProposalNumber { epoch: 0, site: 0 };

    pub fn new(epoch: u64, site: SiteId) -> Self {
        Self { epoch, site }
    }

    /// First number a site uses for a slot it has never proposed in.
    pub fn initial(site: SiteId) -> Self {
        Self { epoch: 1, site }
    }

    /// Smallest number owned by `site` that beats both `self` and `rejected`.
    pub fn outbid(self, rejected: Option<ProposalNumber>, site: SiteId) -> Self {
        let floor = rejected.map_or(self.epoch, |r| r.epoch.max(self.epoch));
        Self {
            epoch: floor + 1,
            site,
        }
    }
}

impl fmt::Display for ProposalNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.epoch, self.site)
    }
}

/// Globally unique tag for a proposed value: `<site_name>_<counter>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ProposalId(String);

impl ProposalId {
    pub fn new(site_name: &str, counter: u64) -> Self {
        Self(format!("{}_{}", site_name, counter))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the site that minted this id.
    pub fn site_name(&self) -> &str {
        self.0.rsplit_once('_').map_or(self.0.as_str(), |(site, _)| site)
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value placed in the decision log. Immutable once decided.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry<C> {
    pub proposal_id: ProposalId,
    pub command: C,
}

impl<C> LogEntry<C> {
    pub fn new(proposal_id: ProposalId, command: C) -> Self {
        Self {
            proposal_id,
            command,
        }
    }
}
