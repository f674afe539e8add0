//! Validated import rows and batch statistics

use std::collections::HashSet;
use std::hash::Hash;

use serde::Serialize;

use voting_common::DelegateId;
use voting_delegation::identity_key;

use crate::error::ImportError;
use crate::identity::DelegateIndex;

/// One validated input record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRow<T> {
    /// Index of the record in the input, skipped records included
    pub position: usize,
    pub first_name: String,
    pub last_name: String,
    pub number: String,
    /// Matched delegate; `None` for anonymous rows and rows without a match
    pub delegate_id: Option<DelegateId>,
    pub data: T,
    pub errors: Vec<ImportError>,
}

impl<T> ImportRow<T> {
    /// Start a row from its identity columns, resolving the delegate
    pub(crate) fn identify(position: usize, record: &[String], index: &DelegateIndex, data: T) -> Self {
        let first_name = record[0].clone();
        let last_name = record[1].clone();
        let number = record[2].clone();
        let mut errors = Vec::new();
        let delegate_id = match index.resolve(&first_name, &last_name, &number) {
            Ok(delegate_id) => delegate_id,
            Err(err) => {
                errors.push(err);
                None
            }
        };
        Self {
            position,
            first_name,
            last_name,
            number,
            delegate_id,
            data,
            errors,
        }
    }

    /// Reject the row when an earlier importable row of the same file
    /// already claimed `key`. Rows with errors claim nothing.
    pub(crate) fn claim<K: Eq + Hash>(&mut self, key: Option<K>, claimed: &mut HashSet<K>) {
        let Some(key) = key else {
            return;
        };
        if self.is_importable() && !claimed.insert(key) {
            self.errors.push(ImportError::DuplicateParticipant(identity_key(
                &self.first_name,
                &self.last_name,
                &self.number,
            )));
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.first_name.is_empty() && self.last_name.is_empty()
    }

    pub fn is_importable(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validated rows in input order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedBatch<T> {
    pub rows: Vec<ImportRow<T>>,
    /// Records dropped for having too few fields
    pub skipped: usize,
}

impl<T> Default for ValidatedBatch<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            skipped: 0,
        }
    }
}

impl<T> ValidatedBatch<T> {
    pub fn will_import(&self) -> usize {
        self.rows.iter().filter(|row| row.is_importable()).count()
    }

    pub fn will_not_import(&self) -> usize {
        self.rows.len() - self.will_import()
    }

    pub fn importable(&self) -> impl Iterator<Item = &ImportRow<T>> {
        self.rows.iter().filter(|row| row.is_importable())
    }

    pub fn summary(&self) -> ImportSummary {
        ImportSummary {
            will_import: self.will_import(),
            will_not_import: self.will_not_import(),
            skipped: self.skipped,
        }
    }
}

/// Counts shown before an import is confirmed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub will_import: usize,
    pub will_not_import: usize,
    pub skipped: usize,
}

/// Keep records with at least `fields` fields, validating each with `validate`
pub(crate) fn collect_rows<T, F>(records: &[Vec<String>], fields: usize, mut validate: F) -> ValidatedBatch<T>
where
    F: FnMut(usize, &[String]) -> ImportRow<T>,
{
    let mut batch = ValidatedBatch::default();
    for (position, record) in records.iter().enumerate() {
        if record.len() < fields {
            batch.skipped += 1;
            continue;
        }
        batch.rows.push(validate(position, record));
    }
    batch
}
