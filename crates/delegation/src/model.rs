//! Entity model for delegates, keypads, proxy edges and voting shares.
//!
//! All records are plain data. Identity is carried by the typed ids from
//! `voting_common::types`; records that have not been persisted yet are
//! represented by the `New*` structs, which carry everything but the id.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use voting_common::{
    AbsenteeVoteId, AttendanceLogId, CategoryId, DelegateId, KeypadId, MotionId, ProxyEdgeId,
    ShareRecordId,
};

/// A person eligible to vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegate {
    pub id: DelegateId,
    /// Whether the delegate is counted present
    pub is_present: bool,
    pub first_name: String,
    pub last_name: String,
    /// Membership number, part of the import identity key
    pub number: String,
}

impl Delegate {
    /// Create a delegate that is not present
    pub fn new(id: impl Into<DelegateId>, first_name: &str, last_name: &str, number: &str) -> Self {
        Self {
            id: id.into(),
            is_present: false,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            number: number.to_string(),
        }
    }

    /// Builder style presence setter
    pub fn present(mut self, is_present: bool) -> Self {
        self.is_present = is_present;
        self
    }

    /// Name shown to users
    pub fn display_name(&self) -> String {
        let first = self.first_name.trim();
        let last = self.last_name.trim();
        match (first.is_empty(), last.is_empty()) {
            (false, false) => format!("{} {}", first, last),
            (true, false) => last.to_string(),
            (false, true) => first.to_string(),
            (true, true) => format!("Delegate {}", self.id),
        }
    }

    /// Key used to match import rows against known delegates
    pub fn identity_key(&self) -> String {
        identity_key(&self.first_name, &self.last_name, &self.number)
    }
}

/// `first + " " + last + " " + number`, the identity concatenation shared by
/// delegates and import rows
pub fn identity_key(first_name: &str, last_name: &str, number: &str) -> String {
    [first_name, last_name, number].join(" ")
}

/// Battery state reported by a keypad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerLevel {
    Full,
    Medium,
    Low,
    Empty,
}

impl PowerLevel {
    /// Whether the battery needs attention
    pub fn is_critical(self) -> bool {
        matches!(self, PowerLevel::Low | PowerLevel::Empty)
    }
}

impl fmt::Display for PowerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PowerLevel::Full => "full",
            PowerLevel::Medium => "medium",
            PowerLevel::Low => "low",
            PowerLevel::Empty => "empty",
        };
        f.write_str(label)
    }
}

/// Battery level value for "unknown"
pub const BATTERY_UNKNOWN: i16 = -1;

/// A physical voting device bound to at most one delegate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypad {
    pub id: KeypadId,
    /// Device number, unique across all keypads
    pub number: u32,
    pub delegate_id: Option<DelegateId>,
    /// Battery level 0..=3, -1 when unknown
    pub battery_level: i16,
}

impl Keypad {
    pub fn power(&self) -> Option<PowerLevel> {
        match self.battery_level {
            0 => Some(PowerLevel::Full),
            1 => Some(PowerLevel::Medium),
            2 => Some(PowerLevel::Low),
            3 => Some(PowerLevel::Empty),
            _ => None,
        }
    }

    pub fn title(&self) -> String {
        format!("Keypad {}", self.number)
    }
}

/// Keypad that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewKeypad {
    pub number: u32,
    pub delegate_id: Option<DelegateId>,
}

impl NewKeypad {
    pub fn into_keypad(self, id: KeypadId) -> Keypad {
        Keypad {
            id,
            number: self.number,
            delegate_id: self.delegate_id,
            battery_level: BATTERY_UNKNOWN,
        }
    }
}

/// Directed edge "principal -> representative"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEdge {
    pub id: ProxyEdgeId,
    /// The principal handing over its vote
    pub delegate_id: DelegateId,
    /// The representative casting the vote
    pub proxy_id: DelegateId,
}

impl fmt::Display for ProxyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} >> {}", self.delegate_id, self.proxy_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProxyEdge {
    pub delegate_id: DelegateId,
    pub proxy_id: DelegateId,
}

impl NewProxyEdge {
    pub fn into_edge(self, id: ProxyEdgeId) -> ProxyEdge {
        ProxyEdge {
            id,
            delegate_id: self.delegate_id,
            proxy_id: self.proxy_id,
        }
    }
}

/// Voting weight of a delegate within one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub id: ShareRecordId,
    pub delegate_id: DelegateId,
    pub category_id: CategoryId,
    pub shares: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewShareRecord {
    pub delegate_id: DelegateId,
    pub category_id: CategoryId,
    pub shares: Decimal,
}

impl NewShareRecord {
    pub fn into_record(self, id: ShareRecordId) -> ShareRecord {
        ShareRecord {
            id,
            delegate_id: self.delegate_id,
            category_id: self.category_id,
            shares: self.shares,
        }
    }
}

/// A weighting dimension; the label encodes `"<name>.<precision>"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub label: String,
}

impl Category {
    pub fn new(id: impl Into<CategoryId>, label: &str) -> Self {
        Self {
            id: id.into(),
            label: label.to_string(),
        }
    }

    /// Parsed name and precision of the label
    pub fn principle(&self) -> crate::principle::Principle {
        crate::principle::parse_principle(&self.label)
    }
}

/// A motion that absentee votes can refer to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motion {
    pub id: MotionId,
    pub identifier: String,
    pub title: String,
}

/// Vote choice of an absentee ballot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteChoice {
    #[serde(rename = "Y")]
    Yes,
    #[serde(rename = "N")]
    No,
    #[serde(rename = "A")]
    Abstain,
}

impl VoteChoice {
    /// Parse the one letter code used in import files
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "Y" => Some(VoteChoice::Yes),
            "N" => Some(VoteChoice::No),
            "A" => Some(VoteChoice::Abstain),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            VoteChoice::Yes => "Y",
            VoteChoice::No => "N",
            VoteChoice::Abstain => "A",
        }
    }
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VoteChoice::Yes => "Yes",
            VoteChoice::No => "No",
            VoteChoice::Abstain => "Abstain",
        };
        f.write_str(label)
    }
}

/// A vote submitted in advance by a delegate who will not attend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenteeVote {
    pub id: AbsenteeVoteId,
    pub delegate_id: DelegateId,
    pub motion_id: MotionId,
    pub vote: VoteChoice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAbsenteeVote {
    pub delegate_id: DelegateId,
    pub motion_id: MotionId,
    pub vote: VoteChoice,
}

impl NewAbsenteeVote {
    pub fn into_vote(self, id: AbsenteeVoteId) -> AbsenteeVote {
        AbsenteeVote {
            id,
            delegate_id: self.delegate_id,
            motion_id: self.motion_id,
            vote: self.vote,
        }
    }
}

/// Key of the head count inside an attendance log message
pub const HEADS_KEY: &str = "heads";

/// Immutable snapshot of attendance, written outside this crate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceLog {
    pub id: AttendanceLogId,
    pub created: DateTime<Utc>,
    /// `"heads"` and category ids mapped to attending totals
    pub message: BTreeMap<String, Decimal>,
}

impl AttendanceLog {
    /// Attending head count recorded in this entry
    pub fn heads(&self) -> Option<Decimal> {
        self.message.get(HEADS_KEY).copied()
    }
}
