//! Best-effort application of mutation plans.
//!
//! A plan is not a transaction. Operations that touch the same record run in
//! plan order; all other operations run concurrently. A failed operation is
//! reported and never undoes its siblings.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use voting_common::ExecutorConfig;

use crate::error::{DelegationError, StorageResult};
use crate::model::{AbsenteeVote, Delegate, Keypad, ProxyEdge, ShareRecord};
use crate::plan::{EntityKey, MutationPlan, Operation};
use crate::repository::VotingRepository;

/// Record written by a successful operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Applied {
    Keypad(Keypad),
    ProxyEdge(ProxyEdge),
    Share(ShareRecord),
    AbsenteeVote(AbsenteeVote),
    Delegate(Delegate),
    Deleted,
}

/// Current store state of a record whose update failed; `None` when it is gone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Refreshed {
    Keypad(Option<Keypad>),
    ProxyEdge(Option<ProxyEdge>),
}

/// Result of one planned operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    /// Position of the operation in its plan
    pub index: usize,
    pub operation: Operation,
    pub result: Result<Applied, DelegationError>,
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcome of a whole plan, in plan order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<OperationOutcome>,
    pub refreshed: Vec<Refreshed>,
}

impl BatchReport {
    /// Whether every operation was applied
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(OperationOutcome::is_success)
    }

    pub fn applied_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.applied_count()
    }

    /// Errors of the failed operations, in plan order
    pub fn errors(&self) -> Vec<&DelegationError> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().err())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }
}

/// Applies [`MutationPlan`]s against a [`VotingRepository`]
#[derive(Debug, Clone, Default)]
pub struct BatchExecutor {
    config: ExecutorConfig,
}

impl BatchExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Apply every operation of `plan` and wait for all of them
    pub async fn execute<R>(&self, repository: &R, plan: MutationPlan) -> BatchReport
    where
        R: VotingRepository + ?Sized,
    {
        if plan.is_empty() {
            debug!("Nothing to execute");
            return BatchReport::default();
        }

        let total = plan.len();
        let groups = group_by_entity(plan);
        info!(
            "Executing {} operation(s) in {} group(s)",
            total,
            groups.len()
        );

        let limit = self.config.max_concurrent_operations.max(1);
        let refresh = self.config.refresh_on_failure;
        let results: Vec<(Vec<OperationOutcome>, Vec<Refreshed>)> = stream::iter(groups)
            .map(|group| run_group(repository, group, refresh))
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for (outcomes, refreshed) in results {
            report.outcomes.extend(outcomes);
            report.refreshed.extend(refreshed);
        }
        report.outcomes.sort_by_key(|outcome| outcome.index);

        if report.is_success() {
            info!("Applied all {} operation(s)", total);
        } else {
            warn!(
                "Applied {} of {} operation(s), {} failed",
                report.applied_count(),
                total,
                report.failed_count()
            );
        }
        report
    }
}

/// Operations sharing a record or keypad number key, in plan order within
/// each group. Groups linked by an operation with several keys are merged.
fn group_by_entity(plan: MutationPlan) -> Vec<Vec<(usize, Operation)>> {
    let mut slots: BTreeMap<EntityKey, usize> = BTreeMap::new();
    let mut groups: Vec<Vec<(usize, Operation)>> = Vec::new();
    for (index, operation) in plan.into_iter().enumerate() {
        let keys = operation.entity_keys(index);
        let mut linked: Vec<usize> = keys.iter().filter_map(|key| slots.get(key).copied()).collect();
        linked.sort_unstable();
        linked.dedup();

        let slot = match linked.split_first() {
            None => {
                groups.push(Vec::new());
                groups.len() - 1
            }
            Some((&first, rest)) => {
                for &other in rest {
                    let moved = std::mem::take(&mut groups[other]);
                    groups[first].extend(moved);
                    for slot in slots.values_mut().filter(|slot| **slot == other) {
                        *slot = first;
                    }
                }
                first
            }
        };
        for key in keys {
            slots.insert(key, slot);
        }
        groups[slot].push((index, operation));
    }

    groups.retain(|group| !group.is_empty());
    for group in &mut groups {
        group.sort_by_key(|(index, _)| *index);
    }
    groups
}

async fn run_group<R>(
    repository: &R,
    group: Vec<(usize, Operation)>,
    refresh: bool,
) -> (Vec<OperationOutcome>, Vec<Refreshed>)
where
    R: VotingRepository + ?Sized,
{
    let mut outcomes = Vec::with_capacity(group.len());
    let mut refreshed = Vec::new();

    for (index, operation) in group {
        debug!("Applying operation {}: {}", index, operation);
        let result = match apply(repository, &operation).await {
            Ok(applied) => Ok(applied),
            Err(err) => {
                warn!("Operation {} ({}) failed: {}", index, operation, err);
                if refresh {
                    if let Some(record) = reread(repository, &operation).await {
                        refreshed.push(record);
                    }
                }
                Err(DelegationError::OperationFailed {
                    entity: operation.entity(),
                    cause: err.to_string(),
                })
            }
        };
        outcomes.push(OperationOutcome {
            index,
            operation,
            result,
        });
    }

    (outcomes, refreshed)
}

async fn apply<R>(repository: &R, operation: &Operation) -> StorageResult<Applied>
where
    R: VotingRepository + ?Sized,
{
    let applied = match operation {
        Operation::CreateKeypad(keypad) => {
            Applied::Keypad(repository.create_keypad(keypad.clone()).await?)
        }
        Operation::UpdateKeypad(keypad) => {
            Applied::Keypad(repository.update_keypad(keypad.clone()).await?)
        }
        Operation::DeleteKeypad(keypad) => {
            repository.delete_keypad(keypad.id).await?;
            Applied::Deleted
        }
        Operation::CreateProxyEdge(edge) => {
            Applied::ProxyEdge(repository.create_proxy_edge(edge.clone()).await?)
        }
        Operation::UpdateProxyEdge(edge) => {
            Applied::ProxyEdge(repository.update_proxy_edge(edge.clone()).await?)
        }
        Operation::DeleteProxyEdge(edge) => {
            repository.delete_proxy_edge(edge.id).await?;
            Applied::Deleted
        }
        Operation::CreateShare(share) => Applied::Share(repository.create_share(share.clone()).await?),
        Operation::UpdateShare(share) => Applied::Share(repository.update_share(share.clone()).await?),
        Operation::DeleteShare(share) => {
            repository.delete_share(share.id).await?;
            Applied::Deleted
        }
        Operation::CreateAbsenteeVote(vote) => {
            Applied::AbsenteeVote(repository.create_absentee_vote(vote.clone()).await?)
        }
        Operation::UpdateAbsenteeVote(vote) => {
            Applied::AbsenteeVote(repository.update_absentee_vote(vote.clone()).await?)
        }
        Operation::UpdatePresence {
            delegate_id,
            is_present,
        } => Applied::Delegate(repository.update_presence(*delegate_id, *is_present).await?),
    };
    Ok(applied)
}

/// Store state of the keypad or proxy edge a failed update targeted
async fn reread<R>(repository: &R, operation: &Operation) -> Option<Refreshed>
where
    R: VotingRepository + ?Sized,
{
    let result = match operation {
        Operation::UpdateKeypad(keypad) => {
            repository.get_keypad(keypad.id).await.map(Refreshed::Keypad)
        }
        Operation::UpdateProxyEdge(edge) => {
            repository.get_proxy_edge(edge.id).await.map(Refreshed::ProxyEdge)
        }
        _ => return None,
    };
    match result {
        Ok(record) => Some(record),
        Err(err) => {
            warn!("Could not re-read record of failed operation ({}): {}", operation, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntityKind;
    use crate::memory::MemoryRepository;
    use crate::model::{NewKeypad, NewProxyEdge};
    use crate::plan::Action;
    use voting_common::DelegateId;

    async fn repository() -> MemoryRepository {
        let repository = MemoryRepository::new();
        for id in 1..=4 {
            repository
                .insert_delegate(Delegate::new(id, "D", &id.to_string(), ""))
                .await;
        }
        repository
    }

    #[test_log::test(tokio::test)]
    async fn test_empty_plan() {
        let repository = repository().await;
        let report = BatchExecutor::default()
            .execute(&repository, MutationPlan::new())
            .await;
        assert!(report.is_success());
        assert!(report.outcomes.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_failures_do_not_undo_siblings() {
        let repository = repository().await;
        repository.inject_failure(EntityKind::Keypad, Action::Create).await;

        let plan: MutationPlan = vec![
            Operation::CreateKeypad(NewKeypad {
                number: 3,
                delegate_id: Some(DelegateId(1)),
            }),
            Operation::CreateProxyEdge(NewProxyEdge {
                delegate_id: DelegateId(2),
                proxy_id: DelegateId(1),
            }),
            Operation::UpdatePresence {
                delegate_id: DelegateId(2),
                is_present: true,
            },
        ]
        .into_iter()
        .collect();

        let report = BatchExecutor::default().execute(&repository, plan).await;
        assert!(!report.is_success());
        assert_eq!(report.applied_count(), 2);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.outcomes[0].index, 0);
        assert!(matches!(
            report.outcomes[0].result,
            Err(DelegationError::OperationFailed {
                entity: EntityKind::Keypad,
                ..
            })
        ));

        assert!(repository.proxy_of(DelegateId(2)).await.unwrap().is_some());
        assert!(repository.get_delegate(DelegateId(2)).await.unwrap().unwrap().is_present);
        assert!(repository.keypad_of(DelegateId(1)).await.unwrap().is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_update_is_refreshed() {
        let repository = repository().await;
        let keypad = repository
            .create_keypad(NewKeypad {
                number: 7,
                delegate_id: Some(DelegateId(1)),
            })
            .await
            .unwrap();
        repository.inject_failure(EntityKind::Keypad, Action::Update).await;

        let plan: MutationPlan = vec![Operation::UpdateKeypad(Keypad {
            number: 8,
            ..keypad.clone()
        })]
        .into_iter()
        .collect();

        let report = BatchExecutor::default().execute(&repository, plan).await;
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.refreshed, vec![Refreshed::Keypad(Some(keypad))]);
    }

    #[test_log::test(tokio::test)]
    async fn test_same_record_runs_in_plan_order() {
        let repository = repository().await;
        let keypad = repository
            .create_keypad(NewKeypad {
                number: 7,
                delegate_id: Some(DelegateId(1)),
            })
            .await
            .unwrap();

        let plan: MutationPlan = vec![
            Operation::UpdateKeypad(Keypad {
                number: 9,
                ..keypad.clone()
            }),
            Operation::DeleteKeypad(keypad),
        ]
        .into_iter()
        .collect();

        let executor = BatchExecutor::new(ExecutorConfig {
            max_concurrent_operations: 1,
            refresh_on_failure: false,
        });
        let report = executor.execute(&repository, plan).await;
        assert!(report.is_success());
        assert_eq!(report.outcomes[1].result, Ok(Applied::Deleted));
        assert!(repository.list_keypads().await.unwrap().is_empty());
    }

    #[test]
    fn test_keypad_number_links_groups() {
        let keypad = |id: u64, number: u32| Keypad {
            id: voting_common::KeypadId(id),
            number,
            delegate_id: None,
            battery_level: -1,
        };
        let plan: MutationPlan = vec![
            Operation::DeleteKeypad(keypad(12, 5)),
            Operation::UpdateKeypad(keypad(4, 6)),
            Operation::CreateKeypad(NewKeypad {
                number: 5,
                delegate_id: Some(DelegateId(3)),
            }),
            Operation::DeleteKeypad(keypad(4, 6)),
        ]
        .into_iter()
        .collect();

        let groups = group_by_entity(plan);
        let indices: Vec<Vec<usize>> = groups
            .iter()
            .map(|group| group.iter().map(|(index, _)| *index).collect())
            .collect();
        assert_eq!(indices, vec![vec![0, 2], vec![1, 3]]);
    }
}
