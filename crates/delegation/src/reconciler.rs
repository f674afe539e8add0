//! Turns a delegate's desired state into a minimal mutation plan.
//!
//! The reconciler is a pure function over a [`DelegateSnapshot`]. It never
//! touches the repository; the plan it returns is applied by the
//! [`BatchExecutor`](crate::executor::BatchExecutor).
//!
//! Existing records are always reused before new ones are created so that
//! record ids stay stable for everybody else reading them:
//! - keypad and outgoing proxy edge are updated in place;
//! - incoming mandate edges are matched by principal first, then rows that
//!   no longer have a desired principal are repurposed, and only then new
//!   rows are created. Rows left over are deleted.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::debug;

use voting_common::{CategoryId, DelegateId};

use crate::error::{DelegationError, DelegationResult};
use crate::model::{NewKeypad, NewProxyEdge, NewShareRecord, ProxyEdge};
use crate::plan::{MutationPlan, Operation};
use crate::snapshot::{DelegateSnapshot, DesiredState};

/// Validate `desired` against `snapshot` and plan the mutations that lead there.
///
/// Validation happens before anything is planned; on error no plan exists.
pub fn reconcile(
    snapshot: &DelegateSnapshot,
    desired: &DesiredState,
) -> DelegationResult<MutationPlan> {
    let delegate_id = snapshot.delegate_id();
    let mandates = unique_mandates(&desired.mandates);

    check_cycles(delegate_id, desired.proxy_id, &mandates)?;
    if desired.keypad_number == Some(0) {
        return Err(DelegationError::InvalidKeypadNumber("0".to_string()));
    }
    if let Some(unknown) = mandates
        .iter()
        .find(|id| !snapshot.principals.contains_key(id))
    {
        return Err(DelegationError::UnknownDelegate(*unknown));
    }
    let shares = parse_shares(snapshot, &desired.shares)?;

    let mut plan = MutationPlan::new();
    release_keypads(snapshot, &mandates, &mut plan);
    plan_keypad(snapshot, desired.keypad_number, &mut plan);
    plan_proxy(snapshot, desired.proxy_id, &mut plan);
    plan_shares(snapshot, &shares, &mut plan);
    plan_mandates(snapshot, &mandates, &mut plan);

    if desired.is_present != snapshot.delegate.is_present {
        plan.push(Operation::UpdatePresence {
            delegate_id,
            is_present: desired.is_present,
        });
    }

    debug!(
        "Reconciled delegate {}: {} operation(s) planned",
        delegate_id,
        plan.len()
    );
    Ok(plan)
}

/// First occurrence of every id, input order kept
fn unique_mandates(mandates: &[DelegateId]) -> Vec<DelegateId> {
    let mut seen = HashSet::new();
    mandates.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Rejects a delegate that would represent and be represented by the same
/// party, including itself. Longer cycles are not looked for.
fn check_cycles(
    delegate_id: DelegateId,
    proxy_id: Option<DelegateId>,
    mandates: &[DelegateId],
) -> DelegationResult<()> {
    if let Some(proxy_id) = proxy_id {
        if proxy_id == delegate_id || mandates.contains(&proxy_id) {
            return Err(DelegationError::CycleDetected {
                delegate: delegate_id,
                party: proxy_id,
            });
        }
    }
    if mandates.contains(&delegate_id) {
        return Err(DelegationError::CycleDetected {
            delegate: delegate_id,
            party: delegate_id,
        });
    }
    Ok(())
}

/// Parse raw share input. Blank input counts as "no value".
fn parse_shares(
    snapshot: &DelegateSnapshot,
    raw: &BTreeMap<CategoryId, Option<String>>,
) -> DelegationResult<BTreeMap<CategoryId, Option<Decimal>>> {
    let mut parsed = BTreeMap::new();
    for (category_id, value) in raw {
        let value = match value.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => {
                let invalid = || DelegationError::InvalidShareValue {
                    category: *category_id,
                    value: text.to_string(),
                };
                let mut number = Decimal::from_str(text).map_err(|_| invalid())?;
                if number.is_sign_negative() && !number.is_zero() {
                    return Err(invalid());
                }
                number.set_sign_positive(true);
                let number = match snapshot.category(*category_id) {
                    Some(category) => category.principle().round(number),
                    None => number,
                };
                Some(number)
            }
        };
        parsed.insert(*category_id, value);
    }
    Ok(parsed)
}

/// Keypads of the desired principals are deleted before anything else so that
/// their numbers are free again for the edited delegate.
fn release_keypads(snapshot: &DelegateSnapshot, mandates: &[DelegateId], plan: &mut MutationPlan) {
    for principal_id in mandates {
        if let Some(keypad) = snapshot
            .principals
            .get(principal_id)
            .and_then(|state| state.keypad.as_ref())
        {
            plan.push(Operation::DeleteKeypad(keypad.clone()));
        }
    }
}

fn plan_keypad(snapshot: &DelegateSnapshot, number: Option<u32>, plan: &mut MutationPlan) {
    match (number, &snapshot.keypad) {
        (Some(number), Some(keypad)) if keypad.number != number => {
            let mut keypad = keypad.clone();
            keypad.number = number;
            plan.push(Operation::UpdateKeypad(keypad));
        }
        (Some(_), Some(_)) => {}
        (Some(number), None) => plan.push(Operation::CreateKeypad(NewKeypad {
            number,
            delegate_id: Some(snapshot.delegate_id()),
        })),
        (None, Some(keypad)) => plan.push(Operation::DeleteKeypad(keypad.clone())),
        (None, None) => {}
    }
}

fn plan_proxy(snapshot: &DelegateSnapshot, proxy_id: Option<DelegateId>, plan: &mut MutationPlan) {
    match (proxy_id, &snapshot.proxy) {
        (Some(proxy_id), Some(edge)) if edge.proxy_id != proxy_id => {
            let mut edge = edge.clone();
            edge.proxy_id = proxy_id;
            plan.push(Operation::UpdateProxyEdge(edge));
        }
        (Some(_), Some(_)) => {}
        (Some(proxy_id), None) => plan.push(Operation::CreateProxyEdge(NewProxyEdge {
            delegate_id: snapshot.delegate_id(),
            proxy_id,
        })),
        (None, Some(edge)) => plan.push(Operation::DeleteProxyEdge(edge.clone())),
        (None, None) => {}
    }
}

fn plan_shares(
    snapshot: &DelegateSnapshot,
    shares: &BTreeMap<CategoryId, Option<Decimal>>,
    plan: &mut MutationPlan,
) {
    for (category_id, value) in shares {
        match (value, snapshot.share_for(*category_id)) {
            (Some(value), Some(record)) if record.shares != *value => {
                let mut record = record.clone();
                record.shares = *value;
                plan.push(Operation::UpdateShare(record));
            }
            (Some(_), Some(_)) => {}
            (Some(value), None) => plan.push(Operation::CreateShare(NewShareRecord {
                delegate_id: snapshot.delegate_id(),
                category_id: *category_id,
                shares: *value,
            })),
            (None, Some(record)) => plan.push(Operation::DeleteShare(record.clone())),
            (None, None) => {}
        }
    }
}

/// Set reconciliation of the incoming edges, followed per principal by the
/// presence cascade. Their keypads are released by [`release_keypads`].
fn plan_mandates(snapshot: &DelegateSnapshot, mandates: &[DelegateId], plan: &mut MutationPlan) {
    let delegate_id = snapshot.delegate_id();
    let desired: HashSet<DelegateId> = mandates.iter().copied().collect();

    let mut pool: VecDeque<&ProxyEdge> = snapshot
        .mandates
        .iter()
        .filter(|edge| !desired.contains(&edge.delegate_id))
        .collect();

    for principal_id in mandates {
        let existing = snapshot
            .mandates
            .iter()
            .find(|edge| edge.delegate_id == *principal_id)
            .or_else(|| {
                snapshot
                    .principals
                    .get(principal_id)
                    .and_then(|state| state.proxy.as_ref())
            });

        match existing {
            Some(edge) if edge.proxy_id == delegate_id => {}
            Some(edge) => {
                let mut edge = edge.clone();
                edge.proxy_id = delegate_id;
                plan.push(Operation::UpdateProxyEdge(edge));
            }
            None => match pool.pop_front() {
                Some(reused) => plan.push(Operation::UpdateProxyEdge(ProxyEdge {
                    id: reused.id,
                    delegate_id: *principal_id,
                    proxy_id: delegate_id,
                })),
                None => plan.push(Operation::CreateProxyEdge(NewProxyEdge {
                    delegate_id: *principal_id,
                    proxy_id: delegate_id,
                })),
            },
        }

        // A represented delegate does not count as present.
        if let Some(state) = snapshot.principals.get(principal_id) {
            if state.delegate.is_present {
                plan.push(Operation::UpdatePresence {
                    delegate_id: *principal_id,
                    is_present: false,
                });
            }
        }
    }

    for leftover in pool {
        plan.push(Operation::DeleteProxyEdge(leftover.clone()));
    }
}
