mod service;
mod state;

pub use service::*;
pub use state::*;

use serde::{Deserialize, Serialize};

/// Units of funding one pledge contributes.
pub const PLEDGE_AMOUNT: u64 = 100;

/// A crowdfunding decision, as stored in the replicated log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    CreateProject {
        project_name: String,
        funding_goal: u64,
    },
    CancelProject {
        project_name: String,
    },
    CreatePledge {
        project_name: String,
        pledge_id: String,
        site_name: String,
    },
    WithdrawPledge {
        project_name: String,
        pledge_id: String,
    },
}
