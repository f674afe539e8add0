//! In-memory repository used by tests and embedded callers

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use voting_common::{
    AbsenteeVoteId, CategoryId, DelegateId, KeypadId, MotionId, ProxyEdgeId, ShareRecordId,
};

use crate::error::{EntityKind, StorageError, StorageResult};
use crate::model::{
    AbsenteeVote, AttendanceLog, Category, Delegate, Keypad, Motion, NewAbsenteeVote, NewKeypad,
    NewProxyEdge, NewShareRecord, ProxyEdge, ShareRecord,
};
use crate::plan::Action;
use crate::repository::VotingRepository;

#[derive(Debug, Default)]
struct Tables {
    delegates: BTreeMap<DelegateId, Delegate>,
    keypads: BTreeMap<KeypadId, Keypad>,
    edges: BTreeMap<ProxyEdgeId, ProxyEdge>,
    shares: BTreeMap<ShareRecordId, ShareRecord>,
    categories: BTreeMap<CategoryId, Category>,
    motions: BTreeMap<MotionId, Motion>,
    attendance_logs: Vec<AttendanceLog>,
    absentee_votes: BTreeMap<AbsenteeVoteId, AbsenteeVote>,
    last_id: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn check_keypad(&self, id: Option<KeypadId>, number: u32, owner: Option<DelegateId>) -> StorageResult<()> {
        if number == 0 {
            return Err(StorageError::Other("keypad number must be positive".to_string()));
        }
        for keypad in self.keypads.values().filter(|k| Some(k.id) != id) {
            if keypad.number == number {
                return Err(StorageError::Conflict(format!("keypad number {} is taken", number)));
            }
            if owner.is_some() && keypad.delegate_id == owner {
                return Err(StorageError::Conflict(format!(
                    "delegate {} already holds keypad {}",
                    keypad.delegate_id.map(|d| d.to_string()).unwrap_or_default(),
                    keypad.number
                )));
            }
        }
        Ok(())
    }

    fn check_edge(&self, id: Option<ProxyEdgeId>, principal: DelegateId, proxy: DelegateId) -> StorageResult<()> {
        if principal == proxy {
            return Err(StorageError::Conflict(format!(
                "delegate {} cannot be its own proxy",
                principal
            )));
        }
        if self
            .edges
            .values()
            .any(|edge| Some(edge.id) != id && edge.delegate_id == principal)
        {
            return Err(StorageError::Conflict(format!(
                "delegate {} already has a proxy",
                principal
            )));
        }
        Ok(())
    }

    fn check_share(&self, id: Option<ShareRecordId>, delegate: DelegateId, category: CategoryId) -> StorageResult<()> {
        if self.shares.values().any(|share| {
            Some(share.id) != id && share.delegate_id == delegate && share.category_id == category
        }) {
            return Err(StorageError::Conflict(format!(
                "delegate {} already has shares in category {}",
                delegate, category
            )));
        }
        Ok(())
    }

    fn check_absentee_vote(&self, id: Option<AbsenteeVoteId>, delegate: DelegateId, motion: MotionId) -> StorageResult<()> {
        if self.absentee_votes.values().any(|vote| {
            Some(vote.id) != id && vote.delegate_id == delegate && vote.motion_id == motion
        }) {
            return Err(StorageError::Conflict(format!(
                "delegate {} already voted on motion {}",
                delegate, motion
            )));
        }
        Ok(())
    }
}

/// Repository keeping every table in memory.
///
/// Enforces the same uniqueness rules a relational store would. Writes can
/// be made to fail per entity kind and action with [`MemoryRepository::inject_failure`].
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
    failures: RwLock<HashSet<(EntityKind, Action)>>,
}

impl MemoryRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a delegate
    pub async fn insert_delegate(&self, delegate: Delegate) {
        let mut tables = self.tables.write().await;
        tables.last_id = tables.last_id.max(delegate.id.value());
        tables.delegates.insert(delegate.id, delegate);
    }

    pub async fn insert_category(&self, category: Category) {
        self.tables.write().await.categories.insert(category.id, category);
    }

    pub async fn insert_motion(&self, motion: Motion) {
        self.tables.write().await.motions.insert(motion.id, motion);
    }

    pub async fn insert_attendance_log(&self, log: AttendanceLog) {
        self.tables.write().await.attendance_logs.push(log);
    }

    /// Make every following `action` on `entity` fail with `Unavailable`
    pub async fn inject_failure(&self, entity: EntityKind, action: Action) {
        self.failures.write().await.insert((entity, action));
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    async fn check_failure(&self, entity: EntityKind, action: Action) -> StorageResult<()> {
        if self.failures.read().await.contains(&(entity, action)) {
            return Err(StorageError::Unavailable(format!(
                "injected failure for {} {}",
                entity, action
            )));
        }
        Ok(())
    }
}

fn not_found(entity: EntityKind, id: impl std::fmt::Display) -> StorageError {
    StorageError::NotFound(format!("{} {}", entity, id))
}

#[async_trait]
impl VotingRepository for MemoryRepository {
    async fn get_delegate(&self, id: DelegateId) -> StorageResult<Option<Delegate>> {
        Ok(self.tables.read().await.delegates.get(&id).cloned())
    }

    async fn list_delegates(&self) -> StorageResult<Vec<Delegate>> {
        Ok(self.tables.read().await.delegates.values().cloned().collect())
    }

    async fn update_presence(&self, id: DelegateId, is_present: bool) -> StorageResult<Delegate> {
        self.check_failure(EntityKind::Delegate, Action::Update).await?;
        let mut tables = self.tables.write().await;
        let delegate = tables
            .delegates
            .get_mut(&id)
            .ok_or_else(|| not_found(EntityKind::Delegate, id))?;
        delegate.is_present = is_present;
        Ok(delegate.clone())
    }

    async fn get_keypad(&self, id: KeypadId) -> StorageResult<Option<Keypad>> {
        Ok(self.tables.read().await.keypads.get(&id).cloned())
    }

    async fn keypad_of(&self, delegate_id: DelegateId) -> StorageResult<Option<Keypad>> {
        let tables = self.tables.read().await;
        Ok(tables
            .keypads
            .values()
            .find(|keypad| keypad.delegate_id == Some(delegate_id))
            .cloned())
    }

    async fn keypad_by_number(&self, number: u32) -> StorageResult<Option<Keypad>> {
        let tables = self.tables.read().await;
        Ok(tables.keypads.values().find(|keypad| keypad.number == number).cloned())
    }

    async fn list_keypads(&self) -> StorageResult<Vec<Keypad>> {
        Ok(self.tables.read().await.keypads.values().cloned().collect())
    }

    async fn create_keypad(&self, keypad: NewKeypad) -> StorageResult<Keypad> {
        self.check_failure(EntityKind::Keypad, Action::Create).await?;
        let mut tables = self.tables.write().await;
        tables.check_keypad(None, keypad.number, keypad.delegate_id)?;
        let id = KeypadId(tables.next_id());
        let keypad = keypad.into_keypad(id);
        tables.keypads.insert(id, keypad.clone());
        Ok(keypad)
    }

    async fn update_keypad(&self, keypad: Keypad) -> StorageResult<Keypad> {
        self.check_failure(EntityKind::Keypad, Action::Update).await?;
        let mut tables = self.tables.write().await;
        if !tables.keypads.contains_key(&keypad.id) {
            return Err(not_found(EntityKind::Keypad, keypad.id));
        }
        tables.check_keypad(Some(keypad.id), keypad.number, keypad.delegate_id)?;
        tables.keypads.insert(keypad.id, keypad.clone());
        Ok(keypad)
    }

    async fn delete_keypad(&self, id: KeypadId) -> StorageResult<()> {
        self.check_failure(EntityKind::Keypad, Action::Delete).await?;
        self.tables
            .write()
            .await
            .keypads
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(EntityKind::Keypad, id))
    }

    async fn get_proxy_edge(&self, id: ProxyEdgeId) -> StorageResult<Option<ProxyEdge>> {
        Ok(self.tables.read().await.edges.get(&id).cloned())
    }

    async fn proxy_of(&self, delegate_id: DelegateId) -> StorageResult<Option<ProxyEdge>> {
        let tables = self.tables.read().await;
        Ok(tables
            .edges
            .values()
            .find(|edge| edge.delegate_id == delegate_id)
            .cloned())
    }

    async fn mandates_of(&self, proxy_id: DelegateId) -> StorageResult<Vec<ProxyEdge>> {
        let tables = self.tables.read().await;
        Ok(tables
            .edges
            .values()
            .filter(|edge| edge.proxy_id == proxy_id)
            .cloned()
            .collect())
    }

    async fn list_proxy_edges(&self) -> StorageResult<Vec<ProxyEdge>> {
        Ok(self.tables.read().await.edges.values().cloned().collect())
    }

    async fn create_proxy_edge(&self, edge: NewProxyEdge) -> StorageResult<ProxyEdge> {
        self.check_failure(EntityKind::ProxyEdge, Action::Create).await?;
        let mut tables = self.tables.write().await;
        tables.check_edge(None, edge.delegate_id, edge.proxy_id)?;
        let id = ProxyEdgeId(tables.next_id());
        let edge = edge.into_edge(id);
        tables.edges.insert(id, edge.clone());
        Ok(edge)
    }

    async fn update_proxy_edge(&self, edge: ProxyEdge) -> StorageResult<ProxyEdge> {
        self.check_failure(EntityKind::ProxyEdge, Action::Update).await?;
        let mut tables = self.tables.write().await;
        if !tables.edges.contains_key(&edge.id) {
            return Err(not_found(EntityKind::ProxyEdge, edge.id));
        }
        tables.check_edge(Some(edge.id), edge.delegate_id, edge.proxy_id)?;
        tables.edges.insert(edge.id, edge.clone());
        Ok(edge)
    }

    async fn delete_proxy_edge(&self, id: ProxyEdgeId) -> StorageResult<()> {
        self.check_failure(EntityKind::ProxyEdge, Action::Delete).await?;
        self.tables
            .write()
            .await
            .edges
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(EntityKind::ProxyEdge, id))
    }

    async fn shares_of(&self, delegate_id: DelegateId) -> StorageResult<Vec<ShareRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .shares
            .values()
            .filter(|share| share.delegate_id == delegate_id)
            .cloned()
            .collect())
    }

    async fn share_for(
        &self,
        delegate_id: DelegateId,
        category_id: CategoryId,
    ) -> StorageResult<Option<ShareRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .shares
            .values()
            .find(|share| share.delegate_id == delegate_id && share.category_id == category_id)
            .cloned())
    }

    async fn list_shares(&self) -> StorageResult<Vec<ShareRecord>> {
        Ok(self.tables.read().await.shares.values().cloned().collect())
    }

    async fn create_share(&self, share: NewShareRecord) -> StorageResult<ShareRecord> {
        self.check_failure(EntityKind::ShareRecord, Action::Create).await?;
        let mut tables = self.tables.write().await;
        tables.check_share(None, share.delegate_id, share.category_id)?;
        let id = ShareRecordId(tables.next_id());
        let share = share.into_record(id);
        tables.shares.insert(id, share.clone());
        Ok(share)
    }

    async fn update_share(&self, share: ShareRecord) -> StorageResult<ShareRecord> {
        self.check_failure(EntityKind::ShareRecord, Action::Update).await?;
        let mut tables = self.tables.write().await;
        if !tables.shares.contains_key(&share.id) {
            return Err(not_found(EntityKind::ShareRecord, share.id));
        }
        tables.check_share(Some(share.id), share.delegate_id, share.category_id)?;
        tables.shares.insert(share.id, share.clone());
        Ok(share)
    }

    async fn delete_share(&self, id: ShareRecordId) -> StorageResult<()> {
        self.check_failure(EntityKind::ShareRecord, Action::Delete).await?;
        self.tables
            .write()
            .await
            .shares
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(EntityKind::ShareRecord, id))
    }

    async fn list_categories(&self) -> StorageResult<Vec<Category>> {
        Ok(self.tables.read().await.categories.values().cloned().collect())
    }

    async fn list_motions(&self) -> StorageResult<Vec<Motion>> {
        Ok(self.tables.read().await.motions.values().cloned().collect())
    }

    async fn list_attendance_logs(&self) -> StorageResult<Vec<AttendanceLog>> {
        let mut logs = self.tables.read().await.attendance_logs.clone();
        logs.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(logs)
    }

    async fn list_absentee_votes(&self) -> StorageResult<Vec<AbsenteeVote>> {
        Ok(self.tables.read().await.absentee_votes.values().cloned().collect())
    }

    async fn absentee_vote_for(
        &self,
        delegate_id: DelegateId,
        motion_id: MotionId,
    ) -> StorageResult<Option<AbsenteeVote>> {
        let tables = self.tables.read().await;
        Ok(tables
            .absentee_votes
            .values()
            .find(|vote| vote.delegate_id == delegate_id && vote.motion_id == motion_id)
            .cloned())
    }

    async fn create_absentee_vote(&self, vote: NewAbsenteeVote) -> StorageResult<AbsenteeVote> {
        self.check_failure(EntityKind::AbsenteeVote, Action::Create).await?;
        let mut tables = self.tables.write().await;
        tables.check_absentee_vote(None, vote.delegate_id, vote.motion_id)?;
        let id = AbsenteeVoteId(tables.next_id());
        let vote = vote.into_vote(id);
        tables.absentee_votes.insert(id, vote.clone());
        Ok(vote)
    }

    async fn update_absentee_vote(&self, vote: AbsenteeVote) -> StorageResult<AbsenteeVote> {
        self.check_failure(EntityKind::AbsenteeVote, Action::Update).await?;
        let mut tables = self.tables.write().await;
        if !tables.absentee_votes.contains_key(&vote.id) {
            return Err(not_found(EntityKind::AbsenteeVote, vote.id));
        }
        tables.check_absentee_vote(Some(vote.id), vote.delegate_id, vote.motion_id)?;
        tables.absentee_votes.insert(vote.id, vote.clone());
        Ok(vote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repository() -> MemoryRepository {
        let repository = MemoryRepository::new();
        for id in 1..=3 {
            repository
                .insert_delegate(Delegate::new(id, "D", &id.to_string(), ""))
                .await;
        }
        repository
    }

    #[tokio::test]
    async fn test_keypad_uniqueness() {
        let repository = repository().await;
        let keypad = repository
            .create_keypad(NewKeypad {
                number: 5,
                delegate_id: Some(DelegateId(1)),
            })
            .await
            .unwrap();
        assert!(keypad.id.value() > 3);

        let taken = repository
            .create_keypad(NewKeypad {
                number: 5,
                delegate_id: None,
            })
            .await;
        assert!(matches!(taken, Err(StorageError::Conflict(_))));

        let second = repository
            .create_keypad(NewKeypad {
                number: 6,
                delegate_id: Some(DelegateId(1)),
            })
            .await;
        assert!(matches!(second, Err(StorageError::Conflict(_))));

        assert_eq!(repository.keypad_by_number(5).await.unwrap(), Some(keypad.clone()));
        assert_eq!(repository.keypad_of(DelegateId(1)).await.unwrap(), Some(keypad));
    }

    #[tokio::test]
    async fn test_edge_rules() {
        let repository = repository().await;
        let own = repository
            .create_proxy_edge(NewProxyEdge {
                delegate_id: DelegateId(1),
                proxy_id: DelegateId(1),
            })
            .await;
        assert!(matches!(own, Err(StorageError::Conflict(_))));

        let edge = repository
            .create_proxy_edge(NewProxyEdge {
                delegate_id: DelegateId(1),
                proxy_id: DelegateId(2),
            })
            .await
            .unwrap();
        let second = repository
            .create_proxy_edge(NewProxyEdge {
                delegate_id: DelegateId(1),
                proxy_id: DelegateId(3),
            })
            .await;
        assert!(matches!(second, Err(StorageError::Conflict(_))));

        // Updating the edge itself is not a conflict with itself.
        let moved = repository
            .update_proxy_edge(ProxyEdge {
                proxy_id: DelegateId(3),
                ..edge.clone()
            })
            .await
            .unwrap();
        assert_eq!(repository.mandates_of(DelegateId(3)).await.unwrap(), vec![moved]);
        assert!(repository.mandates_of(DelegateId(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let repository = repository().await;
        repository.inject_failure(EntityKind::Delegate, Action::Update).await;
        let result = repository.update_presence(DelegateId(1), true).await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));

        repository.clear_failures().await;
        let delegate = repository.update_presence(DelegateId(1), true).await.unwrap();
        assert!(delegate.is_present);
    }

    #[test]
    fn test_listings_are_ordered() {
        tokio_test::block_on(async {
            let repository = MemoryRepository::new();
            repository.insert_category(Category::new(2, "Capital.2")).await;
            repository.insert_category(Category::new(1, "Heads.0")).await;
            let ids: Vec<_> = repository
                .list_categories()
                .await
                .unwrap()
                .iter()
                .map(|category| category.id)
                .collect();
            assert_eq!(ids, vec![CategoryId(1), CategoryId(2)]);

            let older = AttendanceLog {
                id: 1.into(),
                created: chrono::Utc::now() - chrono::Duration::minutes(5),
                message: Default::default(),
            };
            let newer = AttendanceLog {
                id: 2.into(),
                created: chrono::Utc::now(),
                message: Default::default(),
            };
            repository.insert_attendance_log(older).await;
            repository.insert_attendance_log(newer.clone()).await;
            assert_eq!(repository.list_attendance_logs().await.unwrap()[0], newer);
        });
    }

    #[tokio::test]
    async fn test_missing_records() {
        let repository = repository().await;
        assert!(matches!(
            repository.delete_keypad(KeypadId(99)).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            repository.update_presence(DelegateId(99), true).await,
            Err(StorageError::NotFound(_))
        ));
    }
}
