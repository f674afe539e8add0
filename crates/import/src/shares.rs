//! Share import: `first_name, last_name, number, <category>...`

use std::collections::HashSet;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use voting_common::CategoryId;
use voting_delegation::{Category, MutationPlan, NewShareRecord, Operation, ShareRecord};

use crate::batch::{collect_rows, ImportRow, ValidatedBatch};
use crate::error::{ImportError, ImportResult};
use crate::identity::DelegateIndex;

/// Leading identity columns of every import
pub const IDENTITY_FIELDS: usize = 3;

/// Share records need at least one category column
pub const SHARE_FIELDS: usize = 4;

/// A category column of a share file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareColumn {
    pub label: String,
    pub category_id: CategoryId,
}

/// One category cell of a share row; `value` is unset when the cell is invalid
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareCell {
    pub category_id: CategoryId,
    pub raw: String,
    pub value: Option<Decimal>,
}

pub type ShareRow = ImportRow<Vec<ShareCell>>;

/// Map the trailing columns to categories.
///
/// With a header every label must name a category (compared by principle
/// name). Without one the columns follow the categories in id order.
pub fn resolve_columns(
    header: Option<&[String]>,
    column_count: usize,
    categories: &[Category],
) -> ImportResult<Vec<ShareColumn>> {
    match header {
        Some(header) => header
            .iter()
            .skip(IDENTITY_FIELDS)
            .map(|label| {
                categories
                    .iter()
                    .find(|category| category.principle().matches(label))
                    .map(|category| ShareColumn {
                        label: label.clone(),
                        category_id: category.id,
                    })
                    .ok_or_else(|| ImportError::UnknownCategory(label.clone()))
            })
            .collect(),
        None => {
            let mut ordered: Vec<&Category> = categories.iter().collect();
            ordered.sort_by_key(|category| category.id);
            (0..column_count)
                .map(|i| {
                    ordered
                        .get(i)
                        .map(|category| ShareColumn {
                            label: category.principle().name,
                            category_id: category.id,
                        })
                        .ok_or_else(|| {
                            ImportError::UnknownCategory(format!("column {}", IDENTITY_FIELDS + i + 1))
                        })
                })
                .collect()
        }
    }
}

/// Validate share records.
///
/// Unknown categories reject the whole import. Otherwise every record with
/// at least four fields becomes a row; invalid cells and delegates listed
/// more than once are reported per row.
pub fn validate_shares(
    header: Option<&[String]>,
    records: &[Vec<String>],
    index: &DelegateIndex,
    categories: &[Category],
) -> ImportResult<(Vec<ShareColumn>, ValidatedBatch<Vec<ShareCell>>)> {
    let column_count = records
        .iter()
        .map(|record| record.len().saturating_sub(IDENTITY_FIELDS))
        .max()
        .unwrap_or(0);
    let columns = resolve_columns(header, column_count, categories)?;
    let mut claimed = HashSet::new();

    let batch = collect_rows(records, SHARE_FIELDS, |position, record| {
        let mut row = ImportRow::identify(position, record, index, Vec::new());
        for (i, column) in columns.iter().enumerate() {
            let raw = record
                .get(IDENTITY_FIELDS + i)
                .cloned()
                .unwrap_or_default();
            let value = match Decimal::from_str(raw.trim()) {
                Ok(value) if !value.is_sign_negative() || value.is_zero() => Some(value.abs()),
                _ => {
                    row.errors.push(ImportError::InvalidNumber {
                        column: column.label.clone(),
                        value: raw.clone(),
                    });
                    None
                }
            };
            row.data.push(ShareCell {
                category_id: column.category_id,
                raw,
                value,
            });
        }
        row.claim(row.delegate_id, &mut claimed);
        row
    });

    debug!(
        "Validated share import: {} importable, {} rejected, {} skipped",
        batch.will_import(),
        batch.will_not_import(),
        batch.skipped
    );
    Ok((columns, batch))
}

/// Operations for the importable rows, updating existing records in place.
/// Anonymous rows have no owner and produce nothing.
pub fn plan_shares(
    batch: &ValidatedBatch<Vec<ShareCell>>,
    existing: &[ShareRecord],
    categories: &[Category],
) -> MutationPlan {
    let mut plan = MutationPlan::new();
    for row in batch.importable() {
        let Some(delegate_id) = row.delegate_id else {
            continue;
        };
        for cell in &row.data {
            let Some(value) = cell.value else {
                continue;
            };
            let value = categories
                .iter()
                .find(|category| category.id == cell.category_id)
                .map(|category| category.principle().round(value))
                .unwrap_or(value);
            let current = existing.iter().find(|share| {
                share.delegate_id == delegate_id && share.category_id == cell.category_id
            });
            match current {
                Some(share) if share.shares == value => {}
                Some(share) => {
                    let mut share = share.clone();
                    share.shares = value;
                    plan.push(Operation::UpdateShare(share));
                }
                None => plan.push(Operation::CreateShare(NewShareRecord {
                    delegate_id,
                    category_id: cell.category_id,
                    shares: value,
                })),
            }
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use voting_common::{DelegateId, ShareRecordId};
    use voting_delegation::{Action, Delegate, EntityKind};

    fn record(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    fn categories() -> Vec<Category> {
        vec![Category::new(2, "Capital.2"), Category::new(1, "Heads.0")]
    }

    fn index() -> DelegateIndex {
        DelegateIndex::new(&[
            Delegate::new(1, "Ada", "Lovelace", "7"),
            Delegate::new(2, "Alan", "Turing", ""),
        ])
    }

    #[test]
    fn test_header_maps_columns_by_name() {
        let header = record(&["first", "last", "number", "Heads", "Capital.2"]);
        let columns = resolve_columns(Some(&header), 2, &categories()).unwrap();
        assert_eq!(columns[0].category_id, CategoryId(1));
        assert_eq!(columns[1].category_id, CategoryId(2));

        let header = record(&["first", "last", "number", "Votes"]);
        assert_eq!(
            resolve_columns(Some(&header), 1, &categories()),
            Err(ImportError::UnknownCategory("Votes".to_string()))
        );
    }

    #[test]
    fn test_positional_columns_follow_category_ids() {
        let columns = resolve_columns(None, 2, &categories()).unwrap();
        assert_eq!(columns[0].category_id, CategoryId(1));
        assert_eq!(columns[0].label, "Heads");
        assert!(resolve_columns(None, 3, &categories()).is_err());
    }

    #[test]
    fn test_rows_are_validated() {
        let header = record(&["first", "last", "number", "Heads"]);
        let records = vec![
            record(&["Ada", "Lovelace", "7", "1"]),
            record(&["", "", "", "3"]),
            record(&["Grace", "Hopper", "", "1"]),
            record(&["Alan", "Turing", "", "-2"]),
            record(&["short", "row", ""]),
        ];
        let (_, batch) = validate_shares(Some(&header), &records, &index(), &categories()).unwrap();

        assert_eq!(batch.skipped, 1);
        assert_eq!(batch.rows.len(), 4);
        assert_eq!(batch.will_import(), 2);
        assert_eq!(batch.will_not_import(), 2);

        assert_eq!(batch.rows[0].delegate_id, Some(DelegateId(1)));
        assert!(batch.rows[1].is_anonymous());
        assert!(batch.rows[1].is_importable());
        assert!(matches!(batch.rows[2].errors[0], ImportError::ParticipantNotFound(_)));
        assert!(matches!(batch.rows[3].errors[0], ImportError::InvalidNumber { .. }));
    }

    #[test]
    fn test_repeated_delegate_is_rejected() {
        let records = vec![
            record(&["Ada", "Lovelace", "7", "1"]),
            record(&["Ada", "Lovelace", "7", "2"]),
            record(&["", "", "", "1"]),
            record(&["", "", "", "1"]),
        ];
        let (_, batch) = validate_shares(None, &records, &index(), &categories()).unwrap();

        assert_eq!(
            batch.rows[1].errors,
            vec![ImportError::DuplicateParticipant("Ada Lovelace 7".to_string())]
        );
        assert_eq!(batch.will_import(), 3);
        assert_eq!(plan_shares(&batch, &[], &categories()).len(), 1);
    }

    #[test]
    fn test_negative_zero_is_plain_zero() {
        let records = vec![record(&["Ada", "Lovelace", "7", "-0"])];
        let (_, batch) = validate_shares(None, &records, &index(), &categories()).unwrap();
        let value = batch.rows[0].data[0].value.unwrap();
        assert!(!value.is_sign_negative());
        assert_eq!(value.to_string(), "0");
    }

    #[test]
    fn test_plan_reuses_records() {
        let records = vec![
            record(&["Ada", "Lovelace", "7", "1", "2.555"]),
            record(&["Alan", "Turing", "", "1", "4"]),
            record(&["", "", "", "1", "1"]),
        ];
        let (_, batch) = validate_shares(None, &records, &index(), &categories()).unwrap();
        let existing = vec![
            ShareRecord {
                id: ShareRecordId(9),
                delegate_id: DelegateId(1),
                category_id: CategoryId(2),
                shares: Decimal::ONE,
            },
            ShareRecord {
                id: ShareRecordId(10),
                delegate_id: DelegateId(2),
                category_id: CategoryId(1),
                shares: Decimal::ONE,
            },
        ];

        let plan = plan_shares(&batch, &existing, &categories());
        assert!(plan.contains(&Operation::UpdateShare(ShareRecord {
            shares: Decimal::from_str("2.56").unwrap(),
            ..existing[0].clone()
        })));
        // Alan's heads are unchanged; Ada's heads and Alan's capital are new.
        assert_eq!(plan.count(EntityKind::ShareRecord, Action::Update), 1);
        assert_eq!(plan.count(EntityKind::ShareRecord, Action::Create), 2);
    }
}
