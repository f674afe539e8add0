//! Assembly Voting
//!
//! Delegates, proxies, keypads and voting shares for assemblies: the graph
//! reconciler, the status and attendance evaluators, the batch executor and
//! the import validators.

pub mod app;

/// Module version information
pub mod version {
    /// The current version of the assembly voting library
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Ids, errors, configuration and logging
pub mod common {
    pub use voting_common::*;
}

/// Reconciler, evaluators, repository boundary and executor
pub mod delegation {
    pub use voting_delegation::*;
}

/// Share, keypad and absentee vote imports
pub mod import {
    pub use voting_import::*;
}

pub use app::AssemblyVoting;
pub use rust_decimal::Decimal;
