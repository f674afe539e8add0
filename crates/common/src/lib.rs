//! Common ids, errors, configuration and logging for assembly voting

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{Configuration, ExecutorConfig, LogConfig, VotingConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use types::{
    AbsenteeVoteId, AttendanceLogId, CategoryId, DelegateId, KeypadId, MotionId, ProxyEdgeId,
    ShareRecordId,
};
