use crate::crowdfund::{Action, PLEDGE_AMOUNT};
use crate::replicator::StateMachine;
use crate::types::{LogEntry, Slot};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pledge {
    pub pledge_id: String,
    pub site_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub funding_goal: u64,
    pub pledges: Vec<Pledge>,
}

impl Project {
    pub fn raised(&self) -> u64 {
        self.pledges.len() as u64 * PLEDGE_AMOUNT
    }

    pub fn is_funded(&self) -> bool {
        self.raised() >= self.funding_goal
    }
}

/// Projects and pledges derived from the decided log.
///
/// Entries can be learned out of slot order during catch-up, so a pledge
/// may show up before its project (it waits as a ghost) and a create may
/// show up after its cancellation (it is ignored).
#[derive(Debug, Clone, Default)]
pub struct CrowdfundState {
    pub projects: BTreeMap<String, Project>,
    ghost_pledges: HashMap<String, Vec<Pledge>>,
    cancelled_projects: HashSet<String>,
    withdrawn_pledges: HashSet<String>,
}

impl CrowdfundState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    /// Project that currently holds `pledge_id`.
    pub fn find_pledge(&self, pledge_id: &str) -> Option<(&str, &Project)> {
        self.projects
            .iter()
            .find(|(_, p)| p.pledges.iter().any(|pl| pl.pledge_id == pledge_id))
            .map(|(name, project)| (name.as_str(), project))
    }

    pub fn apply_action(&mut self, action: &Action) {
        match action {
            Action::CreateProject {
                project_name,
                funding_goal,
            } => {
                if self.cancelled_projects.contains(project_name)
                    || self.projects.contains_key(project_name)
                {
                    return;
                }
                let pledges = self.ghost_pledges.remove(project_name).unwrap_or_default();
                self.projects.insert(
                    project_name.clone(),
                    Project {
                        funding_goal: *funding_goal,
                        pledges,
                    },
                );
            }
            Action::CreatePledge {
                project_name,
                pledge_id,
                site_name,
            } => {
                if self.withdrawn_pledges.contains(pledge_id)
                    || self.cancelled_projects.contains(project_name)
                {
                    return;
                }
                let pledge = Pledge {
                    pledge_id: pledge_id.clone(),
                    site_name: site_name.clone(),
                };
                match self.projects.get_mut(project_name) {
                    Some(project) => project.pledges.push(pledge),
                    None => self
                        .ghost_pledges
                        .entry(project_name.clone())
                        .or_default()
                        .push(pledge),
                }
            }
            Action::CancelProject { project_name } => {
                self.cancelled_projects.insert(project_name.clone());
                self.projects.remove(project_name);
                self.ghost_pledges.remove(project_name);
            }
            Action::WithdrawPledge {
                project_name,
                pledge_id,
            } => {
                self.withdrawn_pledges.insert(pledge_id.clone());
                if let Some(project) = self.projects.get_mut(project_name) {
                    project.pledges.retain(|p| &p.pledge_id != pledge_id);
                }
                if let Some(ghosts) = self.ghost_pledges.get_mut(project_name) {
                    ghosts.retain(|p| &p.pledge_id != pledge_id);
                }
            }
        }
    }
}

impl StateMachine for CrowdfundState {
    type Command = Action;

    fn apply(&mut self, _slot: Slot, entry: &LogEntry<Action>) {
        self.apply_action(&entry.command);
    }
}
