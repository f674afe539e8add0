//! Attendance and admission derived from the whole proxy graph

use std::collections::{BTreeMap, HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use voting_common::{CategoryId, DelegateId};

use crate::error::StorageResult;
use crate::model::{AttendanceLog, Category, Delegate, Keypad, ProxyEdge, ShareRecord, HEADS_KEY};
use crate::repository::VotingRepository;

/// Last delegate of a proxy chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedVoter {
    pub voter: DelegateId,
    /// The chain led back to a delegate already visited; the walk stopped
    /// at the last delegate before the repetition.
    pub loop_detected: bool,
}

/// Follow outgoing edges from `delegate_id` until a delegate without proxy
pub fn authorized_voter(
    delegate_id: DelegateId,
    proxies: &HashMap<DelegateId, DelegateId>,
) -> AuthorizedVoter {
    let mut visited = HashSet::from([delegate_id]);
    let mut current = delegate_id;
    while let Some(next) = proxies.get(&current).copied() {
        if !visited.insert(next) {
            warn!(
                "Proxy chain of delegate {} loops back to delegate {}",
                delegate_id, next
            );
            return AuthorizedVoter {
                voter: current,
                loop_detected: true,
            };
        }
        current = next;
    }
    AuthorizedVoter {
        voter: current,
        loop_detected: false,
    }
}

/// `[all, attending, in person, represented]` for heads or one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally<T> {
    pub all: T,
    pub attending: T,
    pub in_person: T,
    pub represented: T,
}

impl<T: Copy + std::ops::Add<Output = T>> Tally<T> {
    fn add(&mut self, value: T, in_person: bool, attending: bool) {
        self.all = self.all + value;
        if attending {
            if in_person {
                self.in_person = self.in_person + value;
            } else {
                self.represented = self.represented + value;
            }
            self.attending = self.in_person + self.represented;
        }
    }
}

/// Attendance summary over all counted delegates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceTotals {
    pub heads: Tally<u64>,
    pub categories: BTreeMap<CategoryId, Tally<Decimal>>,
    /// Delegates whose proxy chain loops
    pub loops: Vec<DelegateId>,
}

impl AttendanceTotals {
    /// Attendance log message: heads and every category mapped to the attending total
    pub fn log_message(&self) -> BTreeMap<String, Decimal> {
        let mut message = BTreeMap::new();
        message.insert(HEADS_KEY.to_string(), Decimal::from(self.heads.attending));
        for (category_id, tally) in &self.categories {
            message.insert(category_id.to_string(), tally.attending);
        }
        message
    }
}

/// Whether the attending head count changed since `latest`
pub fn needs_log_entry(latest: Option<&AttendanceLog>, totals: &AttendanceTotals) -> bool {
    let recorded = latest
        .and_then(AttendanceLog::heads)
        .unwrap_or(Decimal::NEGATIVE_ONE);
    recorded != Decimal::from(totals.heads.attending)
}

/// Delegates admitted to a vote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    /// Votes represented by present authorized voters
    pub votes_count: usize,
    /// Distinct authorized voters, in delegate order
    pub voters: Vec<DelegateId>,
}

/// Everything attendance and admission are computed from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub delegates: Vec<Delegate>,
    pub edges: Vec<ProxyEdge>,
    pub shares: Vec<ShareRecord>,
    pub keypads: Vec<Keypad>,
    pub categories: Vec<Category>,
}

impl Roster {
    pub async fn load<R>(repository: &R) -> StorageResult<Self>
    where
        R: VotingRepository + ?Sized,
    {
        Ok(Self {
            delegates: repository.list_delegates().await?,
            edges: repository.list_proxy_edges().await?,
            shares: repository.list_shares().await?,
            keypads: repository.list_keypads().await?,
            categories: repository.list_categories().await?,
        })
    }

    fn proxies(&self) -> HashMap<DelegateId, DelegateId> {
        self.edges
            .iter()
            .map(|edge| (edge.delegate_id, edge.proxy_id))
            .collect()
    }

    fn shares_by_delegate(&self) -> HashMap<DelegateId, Vec<&ShareRecord>> {
        let mut by_delegate: HashMap<DelegateId, Vec<&ShareRecord>> = HashMap::new();
        for share in &self.shares {
            by_delegate.entry(share.delegate_id).or_default().push(share);
        }
        by_delegate
    }

    fn is_present(&self, delegate_id: DelegateId) -> bool {
        self.delegates
            .iter()
            .any(|delegate| delegate.id == delegate_id && delegate.is_present)
    }

    pub fn authorized_voter(&self, delegate_id: DelegateId) -> AuthorizedVoter {
        authorized_voter(delegate_id, &self.proxies())
    }

    /// Heads and per-category totals. Delegates without any share record
    /// only serve as proxies and are not counted once shares exist.
    pub fn attendance(&self) -> AttendanceTotals {
        let proxies = self.proxies();
        let shares = self.shares_by_delegate();
        let shares_exist = !self.shares.is_empty();

        let mut totals = AttendanceTotals {
            categories: self
                .categories
                .iter()
                .map(|category| (category.id, Tally::default()))
                .collect(),
            ..AttendanceTotals::default()
        };

        for delegate in &self.delegates {
            let own_shares = shares.get(&delegate.id).map(Vec::as_slice).unwrap_or(&[]);
            if shares_exist && own_shares.is_empty() {
                continue;
            }

            let voter = authorized_voter(delegate.id, &proxies);
            if voter.loop_detected {
                totals.loops.push(delegate.id);
            }
            let in_person = voter.voter == delegate.id;
            let attending = self.is_present(voter.voter);

            totals.heads.add(1, in_person, attending);
            for share in own_shares {
                totals
                    .categories
                    .entry(share.category_id)
                    .or_default()
                    .add(share.shares, in_person, attending);
            }
        }
        totals
    }

    /// Delegates with voting rights whose authorized voter is present.
    ///
    /// Once shares exist only delegates holding a positive share count;
    /// `category` further requires a share record in that category and
    /// `require_keypad` a keypad bound to the authorized voter.
    pub fn admitted_delegates(&self, category: Option<CategoryId>, require_keypad: bool) -> Admission {
        let proxies = self.proxies();
        let shares = self.shares_by_delegate();
        let shares_exist = !self.shares.is_empty();

        let mut admission = Admission::default();
        for delegate in &self.delegates {
            let own_shares = shares.get(&delegate.id).map(Vec::as_slice).unwrap_or(&[]);
            if shares_exist && !own_shares.iter().any(|share| share.shares > Decimal::ZERO) {
                continue;
            }
            if let Some(category_id) = category {
                if !own_shares.iter().any(|share| share.category_id == category_id) {
                    continue;
                }
            }

            let voter = authorized_voter(delegate.id, &proxies).voter;
            if !self.is_present(voter) {
                continue;
            }
            if require_keypad
                && !self
                    .keypads
                    .iter()
                    .any(|keypad| keypad.delegate_id == Some(voter))
            {
                continue;
            }

            admission.votes_count += 1;
            if !admission.voters.contains(&voter) {
                admission.voters.push(voter);
            }
        }
        admission
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;
    use voting_common::{AttendanceLogId, KeypadId, ProxyEdgeId, ShareRecordId};

    fn edge(id: u64, principal: u64, proxy: u64) -> ProxyEdge {
        ProxyEdge {
            id: ProxyEdgeId(id),
            delegate_id: DelegateId(principal),
            proxy_id: DelegateId(proxy),
        }
    }

    fn share(id: u64, delegate: u64, category: u64, value: &str) -> ShareRecord {
        ShareRecord {
            id: ShareRecordId(id),
            delegate_id: DelegateId(delegate),
            category_id: CategoryId(category),
            shares: Decimal::from_str(value).unwrap(),
        }
    }

    /// 1 present with keypad, 2 represented by 1, 3 absent, 4 proxy only
    fn roster() -> Roster {
        Roster {
            delegates: vec![
                Delegate::new(1, "A", "One", "").present(true),
                Delegate::new(2, "B", "Two", ""),
                Delegate::new(3, "C", "Three", ""),
                Delegate::new(4, "D", "Four", "").present(true),
            ],
            edges: vec![edge(1, 2, 1)],
            shares: vec![
                share(1, 1, 10, "2.5"),
                share(2, 2, 10, "1.5"),
                share(3, 3, 10, "4"),
            ],
            keypads: vec![Keypad {
                id: KeypadId(1),
                number: 1,
                delegate_id: Some(DelegateId(1)),
                battery_level: -1,
            }],
            categories: vec![Category::new(10, "Capital.1")],
        }
    }

    #[test]
    fn test_authorized_voter_follows_chain() {
        let proxies = HashMap::from([(DelegateId(1), DelegateId(2)), (DelegateId(2), DelegateId(3))]);
        assert_eq!(
            authorized_voter(DelegateId(1), &proxies),
            AuthorizedVoter {
                voter: DelegateId(3),
                loop_detected: false
            }
        );
        assert_eq!(authorized_voter(DelegateId(5), &proxies).voter, DelegateId(5));
    }

    #[test]
    fn test_authorized_voter_stops_on_loop() {
        let proxies = HashMap::from([
            (DelegateId(1), DelegateId(2)),
            (DelegateId(2), DelegateId(3)),
            (DelegateId(3), DelegateId(2)),
        ]);
        let voter = authorized_voter(DelegateId(1), &proxies);
        assert!(voter.loop_detected);
        assert_eq!(voter.voter, DelegateId(3));
    }

    #[test]
    fn test_attendance_totals() {
        let totals = roster().attendance();
        assert_eq!(
            totals.heads,
            Tally {
                all: 3,
                attending: 2,
                in_person: 1,
                represented: 1
            }
        );
        let capital = totals.categories[&CategoryId(10)];
        assert_eq!(capital.all, Decimal::from(8));
        assert_eq!(capital.in_person, Decimal::from_str("2.5").unwrap());
        assert_eq!(capital.represented, Decimal::from_str("1.5").unwrap());
        assert_eq!(capital.attending, Decimal::from(4));
        assert!(totals.loops.is_empty());

        let message = totals.log_message();
        assert_eq!(message[HEADS_KEY], Decimal::from(2));
        assert_eq!(message["10"], Decimal::from(4));
    }

    #[test]
    fn test_log_entry_only_when_heads_change() {
        let totals = roster().attendance();
        assert!(needs_log_entry(None, &totals));

        let log = AttendanceLog {
            id: AttendanceLogId(1),
            created: Utc::now(),
            message: totals.log_message(),
        };
        assert!(!needs_log_entry(Some(&log), &totals));

        let mut changed = roster();
        changed.delegates[0].is_present = false;
        assert!(needs_log_entry(Some(&log), &changed.attendance()));
    }

    #[test]
    fn test_admitted_delegates() {
        let roster = roster();
        let admission = roster.admitted_delegates(None, false);
        assert_eq!(admission.votes_count, 2);
        assert_eq!(admission.voters, vec![DelegateId(1)]);

        assert_eq!(roster.admitted_delegates(Some(CategoryId(11)), false).votes_count, 0);

        let mut without_keypad = roster.clone();
        without_keypad.keypads.clear();
        assert_eq!(without_keypad.admitted_delegates(None, true).votes_count, 0);
        assert_eq!(without_keypad.admitted_delegates(None, false).votes_count, 2);
    }

    #[test]
    fn test_everybody_counts_without_shares() {
        let mut roster = roster();
        roster.shares.clear();
        let totals = roster.attendance();
        assert_eq!(totals.heads.all, 4);
        assert_eq!(totals.heads.attending, 3);
        assert_eq!(roster.admitted_delegates(None, false).votes_count, 3);
    }
}
