//! Delegation service: load, reconcile, execute

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use voting_common::{DelegateId, ExecutorConfig};

use crate::attendance::{needs_log_entry, AttendanceTotals, Roster};
use crate::error::{DelegationError, DelegationResult};
use crate::executor::{BatchExecutor, BatchReport};
use crate::plan::MutationPlan;
use crate::reconciler::reconcile;
use crate::repository::VotingRepository;
use crate::snapshot::{self, DelegateSnapshot, DesiredState};
use crate::status::VotingStatus;

/// Attendance totals plus the log message that is due, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceReport {
    pub totals: AttendanceTotals,
    pub pending_log: Option<BTreeMap<String, Decimal>>,
}

/// Entry point for editing delegates against a repository
pub struct DelegationService<R: VotingRepository + ?Sized> {
    repository: Arc<R>,
    executor: BatchExecutor,
}

impl<R: VotingRepository + ?Sized> DelegationService<R> {
    pub fn new(repository: Arc<R>, config: ExecutorConfig) -> Self {
        Self {
            repository,
            executor: BatchExecutor::new(config),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn executor(&self) -> &BatchExecutor {
        &self.executor
    }

    pub async fn load_snapshot(
        &self,
        delegate_id: DelegateId,
        extra_principals: &[DelegateId],
    ) -> DelegationResult<DelegateSnapshot> {
        snapshot::load_snapshot(self.repository.as_ref(), delegate_id, extra_principals).await
    }

    /// Reconcile and apply an edit of `delegate_id`.
    ///
    /// Validation errors are returned before anything is written; failures
    /// while applying are reported per operation.
    pub async fn edit(
        &self,
        delegate_id: DelegateId,
        desired: &DesiredState,
    ) -> DelegationResult<BatchReport> {
        let snapshot = self.load_snapshot(delegate_id, &desired.mandates).await?;
        let plan = reconcile(&snapshot, desired)?;
        if plan.is_empty() {
            debug!("Edit of delegate {} changes nothing", delegate_id);
            return Ok(BatchReport::default());
        }
        info!("Editing delegate {} with {} operation(s)", delegate_id, plan.len());
        Ok(self.apply(plan).await)
    }

    /// Apply a plan built elsewhere, e.g. by an importer
    pub async fn apply(&self, plan: MutationPlan) -> BatchReport {
        self.executor.execute(self.repository.as_ref(), plan).await
    }

    pub async fn status(&self, delegate_id: DelegateId) -> DelegationResult<VotingStatus> {
        let proxy = self.repository.proxy_of(delegate_id).await?;
        let keypad = self.repository.keypad_of(delegate_id).await?;
        let delegate = self
            .repository
            .get_delegate(delegate_id)
            .await?
            .ok_or(DelegationError::UnknownDelegate(delegate_id))?;
        Ok(VotingStatus::evaluate(
            proxy.as_ref(),
            keypad.as_ref(),
            delegate.is_present,
        ))
    }

    pub async fn roster(&self) -> DelegationResult<Roster> {
        Ok(Roster::load(self.repository.as_ref()).await?)
    }

    /// Current attendance. Writing the pending log entry is up to the caller.
    pub async fn attendance(&self) -> DelegationResult<AttendanceReport> {
        let totals = self.roster().await?.attendance();
        let logs = self.repository.list_attendance_logs().await?;
        let pending_log = needs_log_entry(logs.first(), &totals).then(|| totals.log_message());
        Ok(AttendanceReport {
            totals,
            pending_log,
        })
    }
}

impl<R: VotingRepository + ?Sized> Clone for DelegationService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            executor: self.executor.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRepository;
    use crate::model::Delegate;

    async fn service() -> DelegationService<MemoryRepository> {
        let repository = MemoryRepository::new();
        for id in 1..=3 {
            repository
                .insert_delegate(Delegate::new(id, "D", &id.to_string(), ""))
                .await;
        }
        DelegationService::new(Arc::new(repository), ExecutorConfig::default())
    }

    #[tokio::test]
    async fn test_edit_and_status() {
        let service = service().await;
        let snapshot = service.load_snapshot(DelegateId(1), &[]).await.unwrap();
        let desired = DesiredState::from_snapshot(&snapshot)
            .with_keypad(Some(12))
            .with_presence(true);

        let report = service.edit(DelegateId(1), &desired).await.unwrap();
        assert!(report.is_success());
        assert_eq!(service.status(DelegateId(1)).await.unwrap(), VotingStatus::CanVote);

        // Re-applying the same state is a no-op.
        let report = service.edit(DelegateId(1), &desired).await.unwrap();
        assert!(report.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_delegate() {
        let service = service().await;
        assert_eq!(
            service.status(DelegateId(42)).await,
            Err(DelegationError::UnknownDelegate(DelegateId(42)))
        );
    }

    #[tokio::test]
    async fn test_attendance_report() {
        let service = service().await;
        let report = service.attendance().await.unwrap();
        assert_eq!(report.totals.heads.all, 3);
        assert_eq!(report.totals.heads.attending, 0);
        // No log yet counts as -1, so a first entry is due.
        assert!(report.pending_log.is_some());
    }
}
