//! Matching import rows against known delegates

use std::collections::HashMap;

use voting_common::DelegateId;
use voting_delegation::{identity_key, Delegate};

use crate::error::ImportError;

/// Delegates keyed by `"first last number"`
#[derive(Debug, Clone, Default)]
pub struct DelegateIndex {
    by_key: HashMap<String, Vec<DelegateId>>,
}

impl DelegateIndex {
    pub fn new(delegates: &[Delegate]) -> Self {
        let mut by_key: HashMap<String, Vec<DelegateId>> = HashMap::new();
        for delegate in delegates {
            by_key.entry(delegate.identity_key()).or_default().push(delegate.id);
        }
        Self { by_key }
    }

    /// Resolve a row to a delegate.
    ///
    /// `Ok(None)` marks an anonymous row: first and last name are both empty
    /// and no match is attempted. Anything but exactly one match is an error.
    pub fn resolve(
        &self,
        first_name: &str,
        last_name: &str,
        number: &str,
    ) -> Result<Option<DelegateId>, ImportError> {
        if first_name.is_empty() && last_name.is_empty() {
            return Ok(None);
        }
        let key = identity_key(first_name, last_name, number);
        match self.by_key.get(&key).map(Vec::as_slice) {
            Some([id]) => Ok(Some(*id)),
            _ => Err(ImportError::ParticipantNotFound(key)),
        }
    }
}
