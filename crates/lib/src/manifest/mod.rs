//! Installed-kernel manifest.
//!
//! The manifest is the single record of which kernels are installed, where
//! their executables live, and which one `run` uses by default.

mod store;
mod types;

pub use store::*;
pub use types::*;
