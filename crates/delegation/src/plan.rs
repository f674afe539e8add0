//! Mutation plans: flat ordered lists of tagged operations

use std::fmt;

use serde::{Deserialize, Serialize};

use voting_common::DelegateId;

use crate::error::EntityKind;
use crate::model::{
    AbsenteeVote, Keypad, NewAbsenteeVote, NewKeypad, NewProxyEdge, NewShareRecord, ProxyEdge,
    ShareRecord,
};

/// What an operation does to its record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A single planned mutation against the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    CreateKeypad(NewKeypad),
    UpdateKeypad(Keypad),
    DeleteKeypad(Keypad),
    CreateProxyEdge(NewProxyEdge),
    UpdateProxyEdge(ProxyEdge),
    DeleteProxyEdge(ProxyEdge),
    CreateShare(NewShareRecord),
    UpdateShare(ShareRecord),
    DeleteShare(ShareRecord),
    CreateAbsenteeVote(NewAbsenteeVote),
    UpdateAbsenteeVote(AbsenteeVote),
    /// Only the presence flag of a delegate is ever written
    UpdatePresence {
        delegate_id: DelegateId,
        is_present: bool,
    },
}

/// Identity used to serialize operations that touch the same record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    /// A stored record
    Existing(EntityKind, u64),
    /// A record created by the operation at this plan index
    New(usize),
    /// A keypad number, unique across keypads
    KeypadNumber(u32),
}

impl Operation {
    pub fn action(&self) -> Action {
        match self {
            Operation::CreateKeypad(_)
            | Operation::CreateProxyEdge(_)
            | Operation::CreateShare(_)
            | Operation::CreateAbsenteeVote(_) => Action::Create,
            Operation::UpdateKeypad(_)
            | Operation::UpdateProxyEdge(_)
            | Operation::UpdateShare(_)
            | Operation::UpdateAbsenteeVote(_)
            | Operation::UpdatePresence { .. } => Action::Update,
            Operation::DeleteKeypad(_) | Operation::DeleteProxyEdge(_) | Operation::DeleteShare(_) => {
                Action::Delete
            }
        }
    }

    pub fn entity(&self) -> EntityKind {
        match self {
            Operation::CreateKeypad(_) | Operation::UpdateKeypad(_) | Operation::DeleteKeypad(_) => {
                EntityKind::Keypad
            }
            Operation::CreateProxyEdge(_)
            | Operation::UpdateProxyEdge(_)
            | Operation::DeleteProxyEdge(_) => EntityKind::ProxyEdge,
            Operation::CreateShare(_) | Operation::UpdateShare(_) | Operation::DeleteShare(_) => {
                EntityKind::ShareRecord
            }
            Operation::CreateAbsenteeVote(_) | Operation::UpdateAbsenteeVote(_) => {
                EntityKind::AbsenteeVote
            }
            Operation::UpdatePresence { .. } => EntityKind::Delegate,
        }
    }

    /// Key of the record this operation touches; `index` is the operation's
    /// position in its plan and identifies records that do not exist yet.
    pub fn entity_key(&self, index: usize) -> EntityKey {
        match self {
            Operation::UpdateKeypad(keypad) | Operation::DeleteKeypad(keypad) => {
                EntityKey::Existing(EntityKind::Keypad, keypad.id.value())
            }
            Operation::UpdateProxyEdge(edge) | Operation::DeleteProxyEdge(edge) => {
                EntityKey::Existing(EntityKind::ProxyEdge, edge.id.value())
            }
            Operation::UpdateShare(share) | Operation::DeleteShare(share) => {
                EntityKey::Existing(EntityKind::ShareRecord, share.id.value())
            }
            Operation::UpdateAbsenteeVote(vote) => {
                EntityKey::Existing(EntityKind::AbsenteeVote, vote.id.value())
            }
            Operation::UpdatePresence { delegate_id, .. } => {
                EntityKey::Existing(EntityKind::Delegate, delegate_id.value())
            }
            Operation::CreateKeypad(_)
            | Operation::CreateProxyEdge(_)
            | Operation::CreateShare(_)
            | Operation::CreateAbsenteeVote(_) => EntityKey::New(index),
        }
    }

    /// Every key this operation depends on: its record and, for keypads, the
    /// number it writes or releases.
    pub fn entity_keys(&self, index: usize) -> Vec<EntityKey> {
        let mut keys = vec![self.entity_key(index)];
        match self {
            Operation::CreateKeypad(NewKeypad { number, .. })
            | Operation::UpdateKeypad(Keypad { number, .. })
            | Operation::DeleteKeypad(Keypad { number, .. }) => {
                keys.push(EntityKey::KeypadNumber(*number));
            }
            _ => {}
        }
        keys
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateKeypad(k) => write!(f, "create keypad {}", k.number),
            Operation::UpdateKeypad(k) => write!(f, "update keypad {} (number {})", k.id, k.number),
            Operation::DeleteKeypad(k) => write!(f, "delete keypad {} (number {})", k.id, k.number),
            Operation::CreateProxyEdge(e) => {
                write!(f, "create proxy edge {} >> {}", e.delegate_id, e.proxy_id)
            }
            Operation::UpdateProxyEdge(e) => write!(f, "update proxy edge {} ({})", e.id, e),
            Operation::DeleteProxyEdge(e) => write!(f, "delete proxy edge {} ({})", e.id, e),
            Operation::CreateShare(s) => write!(
                f,
                "create share {} for delegate {} in category {}",
                s.shares, s.delegate_id, s.category_id
            ),
            Operation::UpdateShare(s) => write!(f, "update share {} to {}", s.id, s.shares),
            Operation::DeleteShare(s) => write!(f, "delete share {}", s.id),
            Operation::CreateAbsenteeVote(v) => write!(
                f,
                "create absentee vote {} for delegate {} on motion {}",
                v.vote.code(),
                v.delegate_id,
                v.motion_id
            ),
            Operation::UpdateAbsenteeVote(v) => {
                write!(f, "update absentee vote {} to {}", v.id, v.vote.code())
            }
            Operation::UpdatePresence {
                delegate_id,
                is_present,
            } => write!(f, "set delegate {} present={}", delegate_id, is_present),
        }
    }
}

/// Ordered list of operations produced by the reconciler or an importer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationPlan {
    operations: Vec<Operation>,
}

impl MutationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn extend(&mut self, other: MutationPlan) {
        self.operations.extend(other.operations);
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    /// Number of operations with the given entity kind and action
    pub fn count(&self, entity: EntityKind, action: Action) -> usize {
        self.operations
            .iter()
            .filter(|op| op.entity() == entity && op.action() == action)
            .count()
    }

    pub fn contains(&self, operation: &Operation) -> bool {
        self.operations.contains(operation)
    }
}

impl IntoIterator for MutationPlan {
    type Item = Operation;
    type IntoIter = std::vec::IntoIter<Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.into_iter()
    }
}

impl<'a> IntoIterator for &'a MutationPlan {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

impl FromIterator<Operation> for MutationPlan {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        Self {
            operations: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voting_common::{KeypadId, ProxyEdgeId};

    #[test]
    fn test_entity_keys_group_same_record() {
        let keypad = Keypad {
            id: KeypadId(4),
            number: 9,
            delegate_id: None,
            battery_level: -1,
        };
        let update = Operation::UpdateKeypad(keypad.clone());
        let delete = Operation::DeleteKeypad(keypad);
        assert_eq!(update.entity_key(0), delete.entity_key(1));

        let create = Operation::CreateProxyEdge(NewProxyEdge {
            delegate_id: DelegateId(1),
            proxy_id: DelegateId(2),
        });
        assert_eq!(create.entity_key(2), EntityKey::New(2));
        assert_ne!(create.entity_key(2), create.entity_key(3));
    }

    #[test]
    fn test_keypad_operations_share_their_number() {
        let released = Operation::DeleteKeypad(Keypad {
            id: KeypadId(12),
            number: 5,
            delegate_id: Some(DelegateId(11)),
            battery_level: -1,
        });
        let taken = Operation::CreateKeypad(NewKeypad {
            number: 5,
            delegate_id: Some(DelegateId(3)),
        });
        assert!(released.entity_keys(0).contains(&EntityKey::KeypadNumber(5)));
        assert!(taken.entity_keys(1).contains(&EntityKey::KeypadNumber(5)));
        assert_eq!(
            Operation::UpdatePresence {
                delegate_id: DelegateId(1),
                is_present: false,
            }
            .entity_keys(2)
            .len(),
            1
        );
    }

    #[test]
    fn test_plan_counts() {
        let plan: MutationPlan = vec![
            Operation::DeleteProxyEdge(ProxyEdge {
                id: ProxyEdgeId(1),
                delegate_id: DelegateId(12),
                proxy_id: DelegateId(3),
            }),
            Operation::UpdatePresence {
                delegate_id: DelegateId(11),
                is_present: false,
            },
        ]
        .into_iter()
        .collect();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.count(EntityKind::ProxyEdge, Action::Delete), 1);
        assert_eq!(plan.count(EntityKind::Delegate, Action::Update), 1);
        assert_eq!(plan.count(EntityKind::Keypad, Action::Delete), 0);
    }
}
