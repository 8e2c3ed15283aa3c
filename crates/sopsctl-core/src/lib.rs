//! sopsctl core - shared functionality for the sopsctl tools
//!
//! Standard paths, `~` expansion, and the helpers used to hand control
//! to the external `sops` binary.

pub mod paths;
pub mod process;

pub use paths::Paths;
