//! Repository boundary of the delegation core
//!
//! Every record the core reads or writes goes through [`VotingRepository`].
//! Implementations must be safe to call concurrently; the batch executor
//! issues independent operations in parallel.

use async_trait::async_trait;

use voting_common::{CategoryId, DelegateId, KeypadId, MotionId, ProxyEdgeId, ShareRecordId};

use crate::error::StorageResult;
use crate::model::{
    AbsenteeVote, AttendanceLog, Category, Delegate, Keypad, Motion, NewAbsenteeVote, NewKeypad,
    NewProxyEdge, NewShareRecord, ProxyEdge, ShareRecord,
};

/// Persistence operations required by the reconciler, executor and importers
#[async_trait]
pub trait VotingRepository: Send + Sync {
    // Delegates

    async fn get_delegate(&self, id: DelegateId) -> StorageResult<Option<Delegate>>;

    /// All delegates ordered by id
    async fn list_delegates(&self) -> StorageResult<Vec<Delegate>>;

    /// Write the presence flag; the only delegate field the core changes
    async fn update_presence(&self, id: DelegateId, is_present: bool) -> StorageResult<Delegate>;

    // Keypads

    async fn get_keypad(&self, id: KeypadId) -> StorageResult<Option<Keypad>>;

    /// The keypad bound to `delegate_id`, if any
    async fn keypad_of(&self, delegate_id: DelegateId) -> StorageResult<Option<Keypad>>;

    async fn keypad_by_number(&self, number: u32) -> StorageResult<Option<Keypad>>;

    async fn list_keypads(&self) -> StorageResult<Vec<Keypad>>;

    async fn create_keypad(&self, keypad: NewKeypad) -> StorageResult<Keypad>;

    async fn update_keypad(&self, keypad: Keypad) -> StorageResult<Keypad>;

    async fn delete_keypad(&self, id: KeypadId) -> StorageResult<()>;

    // Proxy edges

    async fn get_proxy_edge(&self, id: ProxyEdgeId) -> StorageResult<Option<ProxyEdge>>;

    /// Outgoing edge of a principal
    async fn proxy_of(&self, delegate_id: DelegateId) -> StorageResult<Option<ProxyEdge>>;

    /// Incoming edges of a representative, ordered by edge id
    async fn mandates_of(&self, proxy_id: DelegateId) -> StorageResult<Vec<ProxyEdge>>;

    async fn list_proxy_edges(&self) -> StorageResult<Vec<ProxyEdge>>;

    async fn create_proxy_edge(&self, edge: NewProxyEdge) -> StorageResult<ProxyEdge>;

    async fn update_proxy_edge(&self, edge: ProxyEdge) -> StorageResult<ProxyEdge>;

    async fn delete_proxy_edge(&self, id: ProxyEdgeId) -> StorageResult<()>;

    // Share records

    async fn shares_of(&self, delegate_id: DelegateId) -> StorageResult<Vec<ShareRecord>>;

    async fn share_for(
        &self,
        delegate_id: DelegateId,
        category_id: CategoryId,
    ) -> StorageResult<Option<ShareRecord>>;

    async fn list_shares(&self) -> StorageResult<Vec<ShareRecord>>;

    async fn create_share(&self, share: NewShareRecord) -> StorageResult<ShareRecord>;

    async fn update_share(&self, share: ShareRecord) -> StorageResult<ShareRecord>;

    async fn delete_share(&self, id: ShareRecordId) -> StorageResult<()>;

    // Read-only collections owned elsewhere

    /// Categories ordered by id
    async fn list_categories(&self) -> StorageResult<Vec<Category>>;

    async fn list_motions(&self) -> StorageResult<Vec<Motion>>;

    /// Attendance logs, newest first
    async fn list_attendance_logs(&self) -> StorageResult<Vec<AttendanceLog>>;

    // Absentee votes

    async fn list_absentee_votes(&self) -> StorageResult<Vec<AbsenteeVote>>;

    async fn absentee_vote_for(
        &self,
        delegate_id: DelegateId,
        motion_id: MotionId,
    ) -> StorageResult<Option<AbsenteeVote>>;

    async fn create_absentee_vote(&self, vote: NewAbsenteeVote) -> StorageResult<AbsenteeVote>;

    async fn update_absentee_vote(&self, vote: AbsenteeVote) -> StorageResult<AbsenteeVote>;
}
