//! Proxy and mandate management for assembly voting.
//!
//! The crate reconciles a delegate's desired state (keypad, representative,
//! represented principals, shares, presence) into a [`MutationPlan`] and
//! applies it through a [`VotingRepository`] with the [`BatchExecutor`].
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use voting_delegation::{DelegationService, DesiredState, MemoryRepository};
//! # use voting_common::{DelegateId, ExecutorConfig};
//! # async fn run() -> voting_delegation::DelegationResult<()> {
//! let service = DelegationService::new(Arc::new(MemoryRepository::new()), ExecutorConfig::default());
//! let snapshot = service.load_snapshot(DelegateId(1), &[]).await?;
//! let desired = DesiredState::from_snapshot(&snapshot).with_proxy(Some(DelegateId(2)));
//! let report = service.edit(DelegateId(1), &desired).await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod attendance;
pub mod error;
pub mod executor;
pub mod memory;
pub mod model;
pub mod plan;
pub mod principle;
pub mod reconciler;
pub mod repository;
pub mod service;
pub mod snapshot;
pub mod status;

pub use attendance::{
    authorized_voter, needs_log_entry, Admission, AttendanceTotals, AuthorizedVoter, Roster, Tally,
};
pub use error::{DelegationError, DelegationResult, EntityKind, StorageError, StorageResult};
pub use executor::{Applied, BatchExecutor, BatchReport, OperationOutcome, Refreshed};
pub use memory::MemoryRepository;
pub use model::{
    identity_key, AbsenteeVote, AttendanceLog, Category, Delegate, Keypad, Motion,
    NewAbsenteeVote, NewKeypad, NewProxyEdge, NewShareRecord, PowerLevel, ProxyEdge, ShareRecord,
    VoteChoice,
};
pub use plan::{Action, EntityKey, MutationPlan, Operation};
pub use principle::{parse_principle, Principle};
pub use reconciler::reconcile;
pub use repository::VotingRepository;
pub use service::{AttendanceReport, DelegationService};
pub use snapshot::{load_snapshot, DelegateSnapshot, DesiredState, PrincipalState};
pub use status::VotingStatus;
