//! Voting eligibility of a delegate

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Keypad, ProxyEdge};

/// Voting eligibility derived from keypad, proxy and presence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingStatus {
    /// The delegate handed its vote to a representative
    HasProxy,
    /// The delegate is present and holds a keypad
    CanVote,
    /// Neither of the above
    Inactive,
}

impl VotingStatus {
    /// A proxy takes precedence over keypad and presence.
    pub fn evaluate(proxy: Option<&ProxyEdge>, keypad: Option<&Keypad>, is_present: bool) -> Self {
        if proxy.is_some() {
            VotingStatus::HasProxy
        } else if keypad.is_some() && is_present {
            VotingStatus::CanVote
        } else {
            VotingStatus::Inactive
        }
    }
}

impl fmt::Display for VotingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VotingStatus::HasProxy => "has_proxy",
            VotingStatus::CanVote => "can_vote",
            VotingStatus::Inactive => "inactive",
        };
        f.write_str(label)
    }
}
