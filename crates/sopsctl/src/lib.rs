//! sopsctl - profile manager for SOPS
//!
//! Keep age recipients and sops options in named profiles, map project
//! directories to them, and let sopsctl build the sops command line.
//!
//! Profile selection priority:
//! 1. `-p/--profile` flag
//! 2. Directory mapping marked `auto`
//! 3. `default_profile`
//! 4. Interactive selection (fzf, or a numbered prompt)
//!
//! Encryption itself is left to sops.

pub mod args;
pub mod config;
pub mod editor;
pub mod error;
pub mod executor;
pub mod profile;
pub mod resolver;
pub mod selector;

pub use config::{Config, DirectoryMapping, Settings};
pub use editor::{Editor, EnvEditor};
pub use error::{ProfileError, Result};
pub use executor::Executor;
pub use profile::{AgeConfig, Profile, SopsOptions};
pub use resolver::{resolve, ProfileSource, Resolution};
pub use selector::{default_selector, Selector};
