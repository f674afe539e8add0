//! Read model of a delegate handed to the reconciler.
//!
//! A snapshot is an explicit, owned copy of everything the reconciler looks
//! at. Callers load it, derive a [`DesiredState`], edit that and reconcile;
//! after the plan was executed they load a fresh snapshot.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use voting_common::{CategoryId, DelegateId};

use crate::error::{DelegationError, DelegationResult};
use crate::model::{Category, Delegate, Keypad, ProxyEdge, ShareRecord};
use crate::repository::VotingRepository;
use crate::status::VotingStatus;

/// Keypad, outgoing edge and presence of a principal of the edited delegate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalState {
    pub delegate: Delegate,
    pub keypad: Option<Keypad>,
    /// The principal's single outgoing edge, wherever it points
    pub proxy: Option<ProxyEdge>,
}

/// Current state of one delegate and its neighbourhood in the proxy graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateSnapshot {
    pub delegate: Delegate,
    pub keypad: Option<Keypad>,
    /// Outgoing edge: the representative of this delegate
    pub proxy: Option<ProxyEdge>,
    /// Incoming edges: principals represented by this delegate
    pub mandates: Vec<ProxyEdge>,
    pub shares: Vec<ShareRecord>,
    pub categories: Vec<Category>,
    /// State of every current principal and of every principal an edit may add
    pub principals: BTreeMap<DelegateId, PrincipalState>,
}

impl DelegateSnapshot {
    pub fn delegate_id(&self) -> DelegateId {
        self.delegate.id
    }

    pub fn status(&self) -> VotingStatus {
        VotingStatus::evaluate(
            self.proxy.as_ref(),
            self.keypad.as_ref(),
            self.delegate.is_present,
        )
    }

    /// Ids of the principals currently pointing to this delegate
    pub fn mandate_ids(&self) -> Vec<DelegateId> {
        self.mandates.iter().map(|edge| edge.delegate_id).collect()
    }

    pub fn share_for(&self, category_id: CategoryId) -> Option<&ShareRecord> {
        self.shares.iter().find(|share| share.category_id == category_id)
    }

    pub fn category(&self, category_id: CategoryId) -> Option<&Category> {
        self.categories.iter().find(|category| category.id == category_id)
    }

    /// Weight per category; categories without a record are absent
    pub fn weights(&self) -> BTreeMap<CategoryId, Decimal> {
        self.shares
            .iter()
            .map(|share| (share.category_id, share.shares))
            .collect()
    }
}

/// The edited state a caller wants a delegate to be in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    /// Keypad number, `None` to unassign
    pub keypad_number: Option<u32>,
    /// Representative, `None` to clear
    pub proxy_id: Option<DelegateId>,
    /// Complete ordered set of principals that should point to this delegate
    pub mandates: Vec<DelegateId>,
    /// Raw share input per category, `None` to delete the record
    pub shares: BTreeMap<CategoryId, Option<String>>,
    pub is_present: bool,
}

impl DesiredState {
    /// The state already implied by `snapshot`; reconciling it yields an empty plan
    pub fn from_snapshot(snapshot: &DelegateSnapshot) -> Self {
        Self {
            keypad_number: snapshot.keypad.as_ref().map(|keypad| keypad.number),
            proxy_id: snapshot.proxy.as_ref().map(|edge| edge.proxy_id),
            mandates: snapshot.mandate_ids(),
            shares: snapshot
                .shares
                .iter()
                .map(|share| (share.category_id, Some(share.shares.to_string())))
                .collect(),
            is_present: snapshot.delegate.is_present,
        }
    }

    pub fn with_keypad(mut self, number: Option<u32>) -> Self {
        self.keypad_number = number;
        self
    }

    pub fn with_proxy(mut self, proxy_id: Option<DelegateId>) -> Self {
        self.proxy_id = proxy_id;
        self
    }

    pub fn with_mandates(mut self, mandates: impl IntoIterator<Item = DelegateId>) -> Self {
        self.mandates = mandates.into_iter().collect();
        self
    }

    pub fn with_share(mut self, category_id: CategoryId, value: Option<&str>) -> Self {
        self.shares.insert(category_id, value.map(str::to_string));
        self
    }

    pub fn with_presence(mut self, is_present: bool) -> Self {
        self.is_present = is_present;
        self
    }
}

/// Load the snapshot of `delegate_id`.
///
/// Principal state is loaded for the current mandates and for every id in
/// `extra_principals`, usually the mandates of the desired state.
pub async fn load_snapshot<R>(
    repository: &R,
    delegate_id: DelegateId,
    extra_principals: &[DelegateId],
) -> DelegationResult<DelegateSnapshot>
where
    R: VotingRepository + ?Sized,
{
    let delegate = repository
        .get_delegate(delegate_id)
        .await?
        .ok_or(DelegationError::UnknownDelegate(delegate_id))?;

    let keypad = repository.keypad_of(delegate_id).await?;
    let proxy = repository.proxy_of(delegate_id).await?;
    let mandates = repository.mandates_of(delegate_id).await?;
    let shares = repository.shares_of(delegate_id).await?;
    let categories = repository.list_categories().await?;

    let mut principals = BTreeMap::new();
    let principal_ids = mandates
        .iter()
        .map(|edge| edge.delegate_id)
        .chain(extra_principals.iter().copied());
    for principal_id in principal_ids {
        if principals.contains_key(&principal_id) {
            continue;
        }
        // Unknown ids are left out; the reconciler reports them.
        let Some(principal) = repository.get_delegate(principal_id).await? else {
            debug!("Principal {} of delegate {} not found", principal_id, delegate_id);
            continue;
        };
        let state = PrincipalState {
            keypad: repository.keypad_of(principal_id).await?,
            proxy: repository.proxy_of(principal_id).await?,
            delegate: principal,
        };
        principals.insert(principal_id, state);
    }

    Ok(DelegateSnapshot {
        delegate,
        keypad,
        proxy,
        mandates,
        shares,
        categories,
        principals,
    })
}
