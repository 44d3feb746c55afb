//! Unified exit codes for the kudos CLI.
//! Part of the public contract; scripts and CI pipelines key off them.

pub const SUCCESS: i32 = 0;
/// A ledger operation was refused (insufficient funds, wrong status, ...).
pub const OP_FAILED: i32 = 1;
/// Setup problem: bad config, missing database, unusable arguments.
pub const CONFIG_ERROR: i32 = 2;
/// `verify` found conservation violations.
pub const INCONSISTENT: i32 = 3;
