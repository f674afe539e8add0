//! Absentee vote import: `first_name, last_name, number, motion_identifier, vote`

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use voting_common::MotionId;
use voting_delegation::{AbsenteeVote, Motion, MutationPlan, NewAbsenteeVote, Operation, VoteChoice};

use crate::batch::{collect_rows, ImportRow, ValidatedBatch};
use crate::error::ImportError;
use crate::identity::DelegateIndex;
use crate::shares::IDENTITY_FIELDS;

pub const ABSENTEE_FIELDS: usize = 5;

/// Motion and vote of a row; either is unset when its cell is invalid
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BallotEntry {
    pub motion_id: Option<MotionId>,
    pub vote: Option<VoteChoice>,
}

pub type AbsenteeRow = ImportRow<BallotEntry>;

/// Validate absentee vote records; a delegate votes once per motion and file.
pub fn validate_absentee_votes(
    records: &[Vec<String>],
    index: &DelegateIndex,
    motions: &[Motion],
) -> ValidatedBatch<BallotEntry> {
    let mut claimed = HashSet::new();
    let batch = collect_rows(records, ABSENTEE_FIELDS, |position, record| {
        let mut row = ImportRow::identify(position, record, index, BallotEntry::default());

        let identifier = &record[IDENTITY_FIELDS];
        let mut matching = motions.iter().filter(|motion| &motion.identifier == identifier);
        match (matching.next(), matching.next()) {
            (Some(motion), None) => row.data.motion_id = Some(motion.id),
            _ => row.errors.push(ImportError::MotionNotFound(identifier.clone())),
        }

        let code = &record[IDENTITY_FIELDS + 1];
        match VoteChoice::from_code(code) {
            Some(vote) => row.data.vote = Some(vote),
            None => row.errors.push(ImportError::InvalidVote(code.clone())),
        }

        let ballot = row.delegate_id.zip(row.data.motion_id);
        row.claim(ballot, &mut claimed);
        row
    });

    debug!(
        "Validated absentee vote import: {} importable, {} rejected, {} skipped",
        batch.will_import(),
        batch.will_not_import(),
        batch.skipped
    );
    batch
}

/// Operations for the importable rows; one vote per delegate and motion.
/// Anonymous rows have no owner and produce nothing.
pub fn plan_absentee_votes(
    batch: &ValidatedBatch<BallotEntry>,
    existing: &[AbsenteeVote],
) -> MutationPlan {
    let mut plan = MutationPlan::new();
    for row in batch.importable() {
        let (Some(delegate_id), Some(motion_id), Some(vote)) =
            (row.delegate_id, row.data.motion_id, row.data.vote)
        else {
            continue;
        };
        let current = existing
            .iter()
            .find(|v| v.delegate_id == delegate_id && v.motion_id == motion_id);
        match current {
            Some(current) if current.vote == vote => {}
            Some(current) => {
                let mut current = current.clone();
                current.vote = vote;
                plan.push(Operation::UpdateAbsenteeVote(current));
            }
            None => plan.push(Operation::CreateAbsenteeVote(NewAbsenteeVote {
                delegate_id,
                motion_id,
                vote,
            })),
        }
    }
    plan
}
