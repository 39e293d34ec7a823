use crate::config::{PeerDirectory, TimingConfig};
use crate::replicator::{
    bind_role, Acceptor, Learner, LogStorage, Proposer, Role, SiteStore, StateMachine, UdpNetwork,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    pub timing: TimingConfig,
    /// Ignore anything persisted and start from an empty log.
    pub fresh: bool,
}

/// One running site: acceptor and learner listeners in the background and a
/// proposer for the caller to drive.
pub struct SiteDaemon<M: StateMachine> {
    directory: Arc<PeerDirectory>,
    store: SiteStore<M>,
    proposer: Arc<Proposer<M>>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl<M: StateMachine> SiteDaemon<M> {
    /// Loads state, binds both listener sockets, starts serving, then runs
    /// recovery. Failing to bind is fatal.
    pub async fn start(
        directory: PeerDirectory,
        storage: LogStorage,
        options: StartOptions,
    ) -> Result<Self> {
        let directory = Arc::new(directory);
        let local = directory.local().clone();
        info!("Starting site {} (id {})", local.name, local.id);

        let store = if options.fresh {
            SiteStore::fresh(storage, local.id)
        } else {
            SiteStore::open(storage, local.id)
        }
        .context("failed to load site state")?;

        let acceptor_socket = bind_role(&local, Role::Acceptor).await?;
        let learner_socket = bind_role(&local, Role::Learner).await?;

        let acceptor = Acceptor::new(local.id, store.acceptor());
        let learner = Learner::new(local.id, store.learner());
        let network = UdpNetwork::new(directory.clone(), options.timing);
        let proposer = Arc::new(Proposer::new(network, store.clone(), learner.clone()));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let acceptor_shutdown = shutdown_rx.clone();
        let acceptor_handle = tokio::spawn(async move {
            if let Err(e) = acceptor.serve(acceptor_socket, acceptor_shutdown).await {
                error!("Acceptor loop failed: {}", e);
            }
        });

        let learner_handle = tokio::spawn(async move {
            if let Err(e) = learner.serve(learner_socket, shutdown_rx).await {
                error!("Learner loop failed: {}", e);
            }
        });

        let daemon = Self {
            directory,
            store,
            proposer,
            shutdown_tx,
            handles: vec![acceptor_handle, learner_handle],
        };

        if let Err(e) = daemon.proposer.recover().await {
            warn!("Recovery incomplete: {}", e);
        }
        info!(
            "Site {} ready, frontier {}, holes {:?}",
            local.name,
            daemon.store.frontier(),
            daemon.store.holes()
        );

        Ok(daemon)
    }

    pub fn directory(&self) -> &PeerDirectory {
        &self.directory
    }

    pub fn store(&self) -> &SiteStore<M> {
        &self.store
    }

    pub fn proposer(&self) -> &Arc<Proposer<M>> {
        &self.proposer
    }

    pub fn site_name(&self) -> &str {
        &self.directory.local().name
    }

    /// Stops both listeners and waits for them to release their sockets.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("Site {} stopped", self.directory.local().name);
    }
}
