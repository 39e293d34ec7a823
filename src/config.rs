use crate::error::ConfigError;
use crate::types::SiteId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ACCEPTOR_PORT_OFFSET: u16 = 1;
pub const LEARNER_PORT_OFFSET: u16 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    pub sites: Vec<SiteConfig>,

    #[serde(default)]
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub address: String,
    pub base_port: u16,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub round_deadline_ms: u64,
    pub peer_timeout_ms: u64,
    pub max_attempts: u32,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            round_deadline_ms: 2000,
            peer_timeout_ms: 200,
            max_attempts: 3,
        }
    }
}

impl TimingConfig {
    pub fn round_deadline(&self) -> Duration {
        Duration::from_millis(self.round_deadline_ms)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        let sites = ["alpha", "beta", "gamma"]
            .iter()
            .enumerate()
            .map(|(i, name)| SiteConfig {
                name: name.to_string(),
                address: "127.0.0.1".to_string(),
                base_port: 5000 + 10 * i as u16,
            })
            .collect();
        Self {
            data_dir: default_data_dir(),
            sites,
            timing: TimingConfig::default(),
        }
    }
}

impl ClusterConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Durable state directory for one site.
    pub fn site_data_dir(&self, id: SiteId) -> PathBuf {
        self.data_dir.join(format!("site-{}", id))
    }
}

/// One validated entry of the peer directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: SiteId,
    pub name: String,
    pub ip: IpAddr,
    pub base_port: u16,
}

impl Peer {
    pub fn acceptor_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.base_port + ACCEPTOR_PORT_OFFSET)
    }

    pub fn learner_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.base_port + LEARNER_PORT_OFFSET)
    }
}

/// Static site directory, built once at startup and never refreshed.
#[derive(Debug, Clone)]
pub struct PeerDirectory {
    local: SiteId,
    peers: Vec<Peer>,
}

impl PeerDirectory {
    pub fn new(config: &ClusterConfig, local_name: &str) -> Result<Self, ConfigError> {
        if config.sites.is_empty() {
            return Err(ConfigError::NoSites);
        }

        let mut seen = HashSet::new();
        let mut peers = Vec::with_capacity(config.sites.len());
        for (index, site) in config.sites.iter().enumerate() {
            if !seen.insert(site.name.as_str()) {
                return Err(ConfigError::DuplicateSite(site.name.clone()));
            }
            let ip: IpAddr = site
                .address
                .parse()
                .map_err(|_| ConfigError::InvalidAddress {
                    site: site.name.clone(),
                    address: site.address.clone(),
                })?;
            if site.base_port.checked_add(LEARNER_PORT_OFFSET).is_none() {
                return Err(ConfigError::PortOverflow {
                    site: site.name.clone(),
                    base_port: site.base_port,
                });
            }
            peers.push(Peer {
                id: index as SiteId,
                name: site.name.clone(),
                ip,
                base_port: site.base_port,
            });
        }

        let local = peers
            .iter()
            .find(|p| p.name == local_name)
            .map(|p| p.id)
            .ok_or_else(|| ConfigError::UnknownSite(local_name.to_string()))?;

        Ok(Self { local, peers })
    }

    pub fn local(&self) -> &Peer {
        &self.peers[self.local as usize]
    }

    pub fn local_id(&self) -> SiteId {
        self.local
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Smallest number of sites whose agreement decides a slot.
    pub fn majority(&self) -> usize {
        self.peers.len() / 2 + 1
    }
}
