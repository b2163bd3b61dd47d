//! Shared utilities.
//!
//! Atomic file replacement, JSON record helpers, hashing and test helpers.

pub mod fs;
pub mod hash;

#[cfg(test)]
pub mod testutil;
