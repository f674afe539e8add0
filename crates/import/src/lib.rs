//! Import of voting shares, keypads and absentee votes.
//!
//! Records arrive already split into fields. Validation is pure and keeps
//! input order; accepted rows are turned into a
//! [`MutationPlan`](voting_delegation::MutationPlan) that reuses existing
//! records before creating new ones.

pub mod absentee;
pub mod batch;
pub mod error;
pub mod identity;
pub mod importer;
pub mod keypads;
pub mod shares;

pub use absentee::{plan_absentee_votes, validate_absentee_votes, AbsenteeRow, BallotEntry};
pub use batch::{ImportRow, ImportSummary, ValidatedBatch};
pub use error::{ImportError, ImportResult};
pub use identity::DelegateIndex;
pub use importer::{ImportOutcome, Importer};
pub use keypads::{plan_keypads, validate_keypads, KeypadRow};
pub use shares::{plan_shares, resolve_columns, validate_shares, ShareCell, ShareColumn, ShareRow};
