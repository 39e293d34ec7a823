//! Line commands typed at a site's console, and the text views they print.

use crate::crowdfund::{Action, CrowdfundState};
use crate::types::{LogEntry, Slot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Create { project: String, goal: u64 },
    Pledge { user: String, project: String },
    Withdraw { pledge_id: String },
    Cancel { project: String },
    Projects,
    List { project: String },
    Log,
    Debug,
    Remove { slot: Slot },
    Quit,
}

impl ConsoleCommand {
    /// `None` for anything that does not match a command and its arity.
    pub fn parse(line: &str) -> Option<Self> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let command = match words.as_slice() {
            ["quit"] => ConsoleCommand::Quit,
            ["log"] => ConsoleCommand::Log,
            ["projects"] => ConsoleCommand::Projects,
            ["debug"] => ConsoleCommand::Debug,
            ["list", project] => ConsoleCommand::List {
                project: project.to_string(),
            },
            ["create", project, goal] => ConsoleCommand::Create {
                project: project.to_string(),
                goal: goal.parse().ok()?,
            },
            ["pledge", user, project] => ConsoleCommand::Pledge {
                user: user.to_string(),
                project: project.to_string(),
            },
            ["withdraw", pledge_id] => ConsoleCommand::Withdraw {
                pledge_id: pledge_id.to_string(),
            },
            ["cancel", project] => ConsoleCommand::Cancel {
                project: project.to_string(),
            },
            ["rm", slot] => ConsoleCommand::Remove {
                slot: slot.parse().ok()?,
            },
            _ => return None,
        };
        Some(command)
    }
}

/// One line per slot before the trailing open slot.
pub fn render_log(log: &[Option<LogEntry<Action>>]) -> Vec<String> {
    let decided = log.len().saturating_sub(1);
    log[..decided]
        .iter()
        .map(|entry| match entry {
            None => "missing entry".to_string(),
            Some(entry) => render_entry(entry),
        })
        .collect()
}

fn render_entry(entry: &LogEntry<Action>) -> String {
    let site = entry.proposal_id.site_name();
    match &entry.command {
        Action::CreateProject {
            project_name,
            funding_goal,
        } => format!("create_project {} {} {}", project_name, site, funding_goal),
        Action::CreatePledge {
            project_name,
            pledge_id,
            ..
        } => format!("make_pledge {} {} {}", pledge_id, project_name, site),
        Action::CancelProject { project_name } => format!("cancel_project {}", project_name),
        Action::WithdrawPledge { pledge_id, .. } => format!("withdraw_pledge {}", pledge_id),
    }
}

/// `<name> <goal> funded|unfunded`, sorted by name.
pub fn render_projects(state: &CrowdfundState) -> Vec<String> {
    state
        .projects
        .iter()
        .map(|(name, project)| {
            let status = if project.is_funded() { "funded" } else { "unfunded" };
            format!("{} {} {}", name, project.funding_goal, status)
        })
        .collect()
}

/// `<pledge_id> <site>` for every pledge to `project`.
pub fn render_pledges(state: &CrowdfundState, project: &str) -> Vec<String> {
    state
        .project(project)
        .map(|p| {
            p.pledges
                .iter()
                .map(|pledge| format!("{} {}", pledge.pledge_id, pledge.site_name))
                .collect()
        })
        .unwrap_or_default()
}
