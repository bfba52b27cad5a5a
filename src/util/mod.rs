//! Shared utilities.
//!
//! Stable name hashing for target ids and content hashing for state
//! memoization.

/// Name and content hashing.
pub mod hash;
