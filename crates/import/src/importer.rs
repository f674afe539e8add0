//! Repository-backed import: validate against current data, then apply

use std::sync::Arc;

use tracing::info;

use voting_common::ExecutorConfig;
use voting_delegation::{BatchExecutor, BatchReport, MutationPlan, VotingRepository};

use crate::absentee::{plan_absentee_votes, validate_absentee_votes, BallotEntry};
use crate::batch::ValidatedBatch;
use crate::error::ImportResult;
use crate::identity::DelegateIndex;
use crate::keypads::{plan_keypads, validate_keypads};
use crate::shares::{plan_shares, validate_shares, ShareCell};

/// Validated rows of an import and the result of applying the accepted ones
#[derive(Debug, Clone)]
pub struct ImportOutcome<T> {
    pub batch: ValidatedBatch<T>,
    pub report: BatchReport,
}

pub struct Importer<R: VotingRepository + ?Sized> {
    repository: Arc<R>,
    executor: BatchExecutor,
}

impl<R: VotingRepository + ?Sized> Importer<R> {
    pub fn new(repository: Arc<R>, config: ExecutorConfig) -> Self {
        Self {
            repository,
            executor: BatchExecutor::new(config),
        }
    }

    async fn delegate_index(&self) -> ImportResult<DelegateIndex> {
        let delegates = self.repository.list_delegates().await?;
        Ok(DelegateIndex::new(&delegates))
    }

    async fn apply<T>(&self, kind: &str, batch: ValidatedBatch<T>, plan: MutationPlan) -> ImportOutcome<T> {
        info!(
            "Importing {}: {} row(s) accepted, {} rejected, {} operation(s)",
            kind,
            batch.will_import(),
            batch.will_not_import(),
            plan.len()
        );
        let report = self.executor.execute(self.repository.as_ref(), plan).await;
        ImportOutcome { batch, report }
    }

    pub async fn preview_shares(
        &self,
        header: Option<&[String]>,
        records: &[Vec<String>],
    ) -> ImportResult<ValidatedBatch<Vec<ShareCell>>> {
        let index = self.delegate_index().await?;
        let categories = self.repository.list_categories().await?;
        let (_, batch) = validate_shares(header, records, &index, &categories)?;
        Ok(batch)
    }

    pub async fn import_shares(
        &self,
        header: Option<&[String]>,
        records: &[Vec<String>],
    ) -> ImportResult<ImportOutcome<Vec<ShareCell>>> {
        let categories = self.repository.list_categories().await?;
        let index = self.delegate_index().await?;
        let (_, batch) = validate_shares(header, records, &index, &categories)?;
        let existing = self.repository.list_shares().await?;
        let plan = plan_shares(&batch, &existing, &categories);
        Ok(self.apply("shares", batch, plan).await)
    }

    pub async fn preview_keypads(
        &self,
        records: &[Vec<String>],
    ) -> ImportResult<ValidatedBatch<Option<u32>>> {
        let index = self.delegate_index().await?;
        let keypads = self.repository.list_keypads().await?;
        Ok(validate_keypads(records, &index, &keypads))
    }

    pub async fn import_keypads(
        &self,
        records: &[Vec<String>],
    ) -> ImportResult<ImportOutcome<Option<u32>>> {
        let index = self.delegate_index().await?;
        let keypads = self.repository.list_keypads().await?;
        let batch = validate_keypads(records, &index, &keypads);
        let plan = plan_keypads(&batch, &keypads);
        Ok(self.apply("keypads", batch, plan).await)
    }

    pub async fn preview_absentee_votes(
        &self,
        records: &[Vec<String>],
    ) -> ImportResult<ValidatedBatch<BallotEntry>> {
        let index = self.delegate_index().await?;
        let motions = self.repository.list_motions().await?;
        Ok(validate_absentee_votes(records, &index, &motions))
    }

    pub async fn import_absentee_votes(
        &self,
        records: &[Vec<String>],
    ) -> ImportResult<ImportOutcome<BallotEntry>> {
        let index = self.delegate_index().await?;
        let motions = self.repository.list_motions().await?;
        let batch = validate_absentee_votes(records, &index, &motions);
        let existing = self.repository.list_absentee_votes().await?;
        let plan = plan_absentee_votes(&batch, &existing);
        Ok(self.apply("absentee votes", batch, plan).await)
    }
}
