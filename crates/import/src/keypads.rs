//! Keypad import: `first_name, last_name, number, keypad`

use std::collections::HashSet;

use tracing::debug;

use voting_delegation::{Keypad, MutationPlan, NewKeypad, Operation};

use crate::batch::{collect_rows, ImportRow, ValidatedBatch};
use crate::error::ImportError;
use crate::identity::DelegateIndex;
use crate::shares::IDENTITY_FIELDS;

pub const KEYPAD_FIELDS: usize = 4;

/// Parsed keypad number of a row; unset when the cell is invalid
pub type KeypadRow = ImportRow<Option<u32>>;

/// Validate keypad records against the keypads already stored.
///
/// A number is rejected when it is not a positive integer, when a stored
/// keypad carries it, or when an earlier row of the same file used it. A
/// delegate gets one keypad per file.
pub fn validate_keypads(
    records: &[Vec<String>],
    index: &DelegateIndex,
    existing: &[Keypad],
) -> ValidatedBatch<Option<u32>> {
    let taken: HashSet<u32> = existing.iter().map(|keypad| keypad.number).collect();
    let mut seen = HashSet::new();
    let mut claimed = HashSet::new();

    let batch = collect_rows(records, KEYPAD_FIELDS, |position, record| {
        let mut row = ImportRow::identify(position, record, index, None);
        let raw = record[IDENTITY_FIELDS].trim();
        let number = match raw.parse::<u32>() {
            Ok(number) if number > 0 => {
                if taken.contains(&number) || seen.contains(&number) {
                    row.errors.push(ImportError::DuplicateKeypadNumber(number));
                    None
                } else {
                    Some(number)
                }
            }
            _ => {
                row.errors
                    .push(ImportError::InvalidKeypadNumber(raw.to_string()));
                None
            }
        };
        row.claim(row.delegate_id, &mut claimed);
        if row.is_importable() {
            if let Some(number) = number {
                seen.insert(number);
                row.data = Some(number);
            }
        }
        row
    });

    debug!(
        "Validated keypad import: {} importable, {} rejected, {} skipped",
        batch.will_import(),
        batch.will_not_import(),
        batch.skipped
    );
    batch
}

/// Operations for the importable rows. A delegate that already holds a
/// keypad gets it renumbered; anonymous rows create unbound keypads.
pub fn plan_keypads(batch: &ValidatedBatch<Option<u32>>, existing: &[Keypad]) -> MutationPlan {
    let mut plan = MutationPlan::new();
    for row in batch.importable() {
        let Some(number) = row.data else {
            continue;
        };
        let current = row.delegate_id.and_then(|delegate_id| {
            existing
                .iter()
                .find(|keypad| keypad.delegate_id == Some(delegate_id))
        });
        match current {
            Some(keypad) => {
                let mut keypad = keypad.clone();
                keypad.number = number;
                plan.push(Operation::UpdateKeypad(keypad));
            }
            None => plan.push(Operation::CreateKeypad(NewKeypad {
                number,
                delegate_id: row.delegate_id,
            })),
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use voting_common::{DelegateId, KeypadId};
    use voting_delegation::Delegate;

    fn record(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    fn existing() -> Vec<Keypad> {
        vec![Keypad {
            id: KeypadId(1),
            number: 5,
            delegate_id: Some(DelegateId(2)),
            battery_level: -1,
        }]
    }

    fn index() -> DelegateIndex {
        DelegateIndex::new(&[
            Delegate::new(1, "Ada", "Lovelace", "7"),
            Delegate::new(2, "Alan", "Turing", ""),
        ])
    }

    #[test]
    fn test_keypad_numbers_are_checked() {
        let records = vec![
            record(&["Ada", "Lovelace", "7", "5"]),
            record(&["Ada", "Lovelace", "7", "0"]),
            record(&["Ada", "Lovelace", "7", "x"]),
            record(&["", "", "", "8"]),
            record(&["Alan", "Turing", "", "8"]),
            record(&["Alan", "Turing", "", "9"]),
        ];
        let batch = validate_keypads(&records, &index(), &existing());

        assert_eq!(batch.rows[0].errors, vec![ImportError::DuplicateKeypadNumber(5)]);
        assert_eq!(
            batch.rows[1].errors,
            vec![ImportError::InvalidKeypadNumber("0".to_string())]
        );
        assert!(matches!(batch.rows[2].errors[0], ImportError::InvalidKeypadNumber(_)));
        assert!(batch.rows[3].is_importable());
        assert_eq!(batch.rows[4].errors, vec![ImportError::DuplicateKeypadNumber(8)]);
        assert!(batch.rows[5].is_importable());
        assert_eq!(batch.summary().will_import, 2);
    }

    #[test]
    fn test_delegate_gets_one_keypad_per_file() {
        let records = vec![
            record(&["Ada", "Lovelace", "7", "0"]),
            record(&["Ada", "Lovelace", "7", "10"]),
            record(&["Ada", "Lovelace", "7", "11"]),
            record(&["Alan", "Turing", "", "11"]),
        ];
        let batch = validate_keypads(&records, &index(), &existing());

        assert!(batch.rows[1].is_importable());
        assert_eq!(
            batch.rows[2].errors,
            vec![ImportError::DuplicateParticipant("Ada Lovelace 7".to_string())]
        );
        // The rejected row does not reserve its number.
        assert!(batch.rows[3].is_importable());
        assert_eq!(batch.will_import(), 2);
        assert_eq!(plan_keypads(&batch, &existing()).len(), 2);
    }

    #[test]
    fn test_plan_renumbers_held_keypads() {
        let records = vec![
            record(&["", "", "", "8"]),
            record(&["Alan", "Turing", "", "9"]),
            record(&["Ada", "Lovelace", "7", "10"]),
        ];
        let batch = validate_keypads(&records, &index(), &existing());
        let plan = plan_keypads(&batch, &existing());

        assert_eq!(
            plan.operations(),
            &[
                Operation::CreateKeypad(NewKeypad {
                    number: 8,
                    delegate_id: None,
                }),
                Operation::UpdateKeypad(Keypad {
                    number: 9,
                    ..existing()[0].clone()
                }),
                Operation::CreateKeypad(NewKeypad {
                    number: 10,
                    delegate_id: Some(DelegateId(1)),
                }),
            ]
        );
    }
}
