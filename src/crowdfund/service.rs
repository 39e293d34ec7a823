use crate::crowdfund::{Action, CrowdfundState};
use crate::replicator::Replicator;
use anyhow::Result;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Result of one crowdfunding command, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    ProjectCreated(String),
    ProjectExists(String),
    ProjectNotCreated(String),
    ProjectNotFound(String),
    ProjectCancelled(String),
    ProjectNotCancelled(String),
    PartiallyCancelled(String),
    PledgeCreated { pledge_id: String, project: String },
    PledgeRejected(String),
    PledgeWithdrawn(String),
    PledgeNotWithdrawn(String),
    PledgeNotFound(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Outcome::ProjectCreated(_)
                | Outcome::ProjectCancelled(_)
                | Outcome::PledgeCreated { .. }
                | Outcome::PledgeWithdrawn(_)
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::ProjectCreated(name) => write!(f, "Created project {}.", name),
            Outcome::ProjectExists(name) => write!(f, "Unable to create {}, already exists.", name),
            Outcome::ProjectNotCreated(name) => write!(f, "Unable to create {}.", name),
            Outcome::ProjectNotFound(name) => write!(f, "Can't find project {}", name),
            Outcome::ProjectCancelled(name) => write!(f, "Project {} cancelled.", name),
            Outcome::ProjectNotCancelled(name) => write!(f, "Unable to cancel {}.", name),
            Outcome::PartiallyCancelled(name) => {
                write!(f, "Some pledges withdrawn, but unable to cancel {}.", name)
            }
            Outcome::PledgeCreated { pledge_id, project } => {
                write!(f, "Created pledge {} to {}.", pledge_id, project)
            }
            Outcome::PledgeRejected(project) => write!(f, "Cannot create pledge to {}.", project),
            Outcome::PledgeWithdrawn(id) => write!(f, "Withdrew pledge {}.", id),
            Outcome::PledgeNotWithdrawn(id) => write!(f, "Cannot withdraw {}.", id),
            Outcome::PledgeNotFound(id) => write!(f, "Pledge {} not found", id),
        }
    }
}

/// Crowdfunding commands. Each one catches up on holes, checks its
/// preconditions against the local view, then proposes.
pub struct CrowdfundService<R: Replicator<Machine = CrowdfundState>> {
    site_name: String,
    replicator: Arc<R>,
}

impl<R: Replicator<Machine = CrowdfundState>> CrowdfundService<R> {
    pub fn new(site_name: String, replicator: Arc<R>) -> Self {
        Self {
            site_name,
            replicator,
        }
    }

    pub fn view(&self) -> CrowdfundState {
        self.replicator.snapshot()
    }

    async fn submit(&self, action: Action) -> bool {
        match self.replicator.propose(action).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Proposal failed: {}", e);
                false
            }
        }
    }

    pub async fn create_project(&self, project_name: &str, funding_goal: u64) -> Result<Outcome> {
        self.replicator.fill_holes().await;
        if self.view().project(project_name).is_some() {
            return Ok(Outcome::ProjectExists(project_name.to_string()));
        }
        let action = Action::CreateProject {
            project_name: project_name.to_string(),
            funding_goal,
        };
        Ok(if self.submit(action).await {
            Outcome::ProjectCreated(project_name.to_string())
        } else {
            Outcome::ProjectNotCreated(project_name.to_string())
        })
    }

    pub async fn create_pledge(&self, user_id: &str, project_name: &str) -> Result<Outcome> {
        self.replicator.fill_holes().await;
        let project = match self.view().project(project_name).cloned() {
            Some(project) => project,
            None => return Ok(Outcome::ProjectNotFound(project_name.to_string())),
        };
        if project.is_funded() {
            return Ok(Outcome::PledgeRejected(project_name.to_string()));
        }

        let pledge_id = format!("{}{}", user_id, self.replicator.sequence());
        let action = Action::CreatePledge {
            project_name: project_name.to_string(),
            pledge_id: pledge_id.clone(),
            site_name: self.site_name.clone(),
        };
        if !self.submit(action).await {
            return Ok(Outcome::PledgeRejected(project_name.to_string()));
        }
        self.replicator.advance_sequence().await?;
        Ok(Outcome::PledgeCreated {
            pledge_id,
            project: project_name.to_string(),
        })
    }

    pub async fn withdraw_pledge(&self, pledge_id: &str) -> Result<Outcome> {
        self.replicator.fill_holes().await;
        let view = self.view();
        let (project_name, project) = match view.find_pledge(pledge_id) {
            Some(found) => found,
            None => return Ok(Outcome::PledgeNotFound(pledge_id.to_string())),
        };
        if project.is_funded() {
            return Ok(Outcome::PledgeNotWithdrawn(pledge_id.to_string()));
        }
        let action = Action::WithdrawPledge {
            project_name: project_name.to_string(),
            pledge_id: pledge_id.to_string(),
        };
        Ok(if self.submit(action).await {
            Outcome::PledgeWithdrawn(pledge_id.to_string())
        } else {
            Outcome::PledgeNotWithdrawn(pledge_id.to_string())
        })
    }

    /// Withdraws every pledge, then cancels. Withdrawals that committed stay
    /// committed when a later step fails.
    pub async fn cancel_project(&self, project_name: &str) -> Result<Outcome> {
        self.replicator.fill_holes().await;
        let project = match self.view().project(project_name).cloned() {
            Some(project) => project,
            None => return Ok(Outcome::ProjectNotFound(project_name.to_string())),
        };
        if project.is_funded() {
            return Ok(Outcome::ProjectNotCancelled(project_name.to_string()));
        }

        let mut withdraw_failed = false;
        for pledge in &project.pledges {
            let action = Action::WithdrawPledge {
                project_name: project_name.to_string(),
                pledge_id: pledge.pledge_id.clone(),
            };
            if !self.submit(action).await {
                withdraw_failed = true;
            }
        }
        if withdraw_failed {
            return Ok(Outcome::PartiallyCancelled(project_name.to_string()));
        }

        let action = Action::CancelProject {
            project_name: project_name.to_string(),
        };
        Ok(if self.submit(action).await {
            Outcome::ProjectCancelled(project_name.to_string())
        } else {
            Outcome::ProjectNotCancelled(project_name.to_string())
        })
    }
}
