//! Pie Core - Lock-aware target allocation engine.
//!
//! A portfolio is a list of pies, each holding a list of holdings. Every
//! sibling group carries integer target percentages that should add up to
//! 100; editing one target rebalances the others, skipping locked items.
//!
//! ```text
//! ┌───────────────┐  load/save  ┌──────────────────┐
//! │ SnapshotStore │◄───────────►│ PortfolioSession │
//! └───────────────┘             └────────┬─────────┘
//!                                        │ by ItemPath
//!                     ┌──────────────────┼──────────────────┐
//!                     ▼                  ▼                  ▼
//!               ┌──────────┐      ┌────────────┐     ┌────────────┐
//!               │ mutations│─────►│ rebalance  │     │  import    │
//!               └──────────┘      └────────────┘     └────────────┘
//!                     │                                     │
//!                     └──────────────► tree ◄───────────────┘
//! ```
//!
//! This crate provides:
//! - The allocation tree and item paths
//! - The rebalancer and the group mutations built on it
//! - Brokerage CSV row extraction and import
//! - Snapshot format and stores
//! - A read-only summary for rendering

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod import;
pub mod mutations;
pub mod rebalance;
pub mod session;
pub mod snapshot;
pub mod summary;
pub mod tree;

pub use import::{
    accounts, import_positions, parse_positions, rows_for_account, Assignment, ImportError,
    ImportReport, PieAssignment, PositionRow,
};
pub use rebalance::{rebalance, RebalanceOutcome};
pub use session::PortfolioSession;
pub use snapshot::{JsonFileStore, MemoryStore, Snapshot, SnapshotStore};
pub use summary::{HoldingSummary, PieSummary, PortfolioSummary};
pub use tree::{Allocation, Holding, ItemPath, Pie, Portfolio, SiblingGroup};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::session::PortfolioSession;
    pub use crate::snapshot::{JsonFileStore, SnapshotStore};
    pub use crate::tree::{Allocation, ItemPath};
}
