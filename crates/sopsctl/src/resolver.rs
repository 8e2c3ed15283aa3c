//! Profile resolution
//!
//! Which profile applies, in order:
//! 1. `-p/--profile` (explicit, never falls through)
//! 2. An `auto` directory mapping covering the current directory
//! 3. `default_profile`
//! 4. Interactive selection

use crate::config::{Config, DirectoryMapping};
use crate::error::{ProfileError, Result};
use crate::profile::Profile;
use crate::selector::Selector;
use sopsctl_core::paths::{is_within, normalize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Where a resolved profile came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSource {
    Explicit,
    /// Mapped directory, as written in the config
    Directory(String),
    Default,
    Interactive,
}

impl fmt::Display for ProfileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit"),
            Self::Directory(dir) => write!(f, "directory auto-select: {}", dir),
            Self::Default => write!(f, "default"),
            Self::Interactive => write!(f, "selected"),
        }
    }
}

/// A resolved profile
#[derive(Debug)]
pub struct Resolution<'a> {
    pub profile: &'a Profile,
    pub source: ProfileSource,
}

/// The directory mapping that covers a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryMatch<'a> {
    /// Directory key as written in the config
    pub directory: &'a str,
    pub mapping: &'a DirectoryMapping,
}

/// Find the most specific directory mapping covering `cwd`.
///
/// A mapping covers `cwd` if it is the same directory or an ancestor.
/// When several do, the deepest one wins.
pub fn match_directory<'a>(config: &'a Config, cwd: &Path) -> Option<DirectoryMatch<'a>> {
    let cwd = normalize(&cwd.to_string_lossy());

    config
        .directories
        .iter()
        .filter_map(|(dir, mapping)| {
            let mapped = normalize(dir);
            is_within(&cwd, &mapped).then(|| (mapped.components().count(), dir, mapping))
        })
        .max_by_key(|(depth, _, _)| *depth)
        .map(|(_, dir, mapping)| DirectoryMatch {
            directory: dir.as_str(),
            mapping,
        })
}

/// Pick the profile to use.
///
/// An explicit name is authoritative: if it does not exist the lookup
/// error is returned. A non-auto directory mapping never selects a
/// profile on its own; it only moves its profile to the top of the
/// interactive list.
pub fn resolve<'a>(
    explicit: Option<&str>,
    cwd: &Path,
    config: &'a Config,
    selector: &dyn Selector,
    allow_interactive: bool,
) -> Result<Resolution<'a>> {
    if let Some(name) = explicit.filter(|n| !n.is_empty()) {
        debug!(profile = name, "using explicit profile");
        return Ok(Resolution {
            profile: config.get_profile(name)?,
            source: ProfileSource::Explicit,
        });
    }

    let mut suggested = None;
    if let Some(found) = match_directory(config, cwd) {
        if found.mapping.auto {
            debug!(
                directory = found.directory,
                profile = %found.mapping.profile,
                "directory auto-select"
            );
            return Ok(Resolution {
                profile: config.get_profile(&found.mapping.profile)?,
                source: ProfileSource::Directory(found.directory.to_string()),
            });
        }

        info!(
            directory = found.directory,
            profile = %found.mapping.profile,
            "directory mapping is not auto, continuing"
        );
        suggested = Some(found.mapping.profile.as_str());
    }

    if let Some(name) = config.default_profile() {
        match config.get_profile(name) {
            Ok(profile) => {
                debug!(profile = name, "using default profile");
                return Ok(Resolution {
                    profile,
                    source: ProfileSource::Default,
                });
            }
            Err(_) => warn!(profile = name, "default profile does not exist, ignoring"),
        }
    }

    let mut profiles = config.list_profiles();
    if !allow_interactive || profiles.is_empty() {
        return Err(ProfileError::NoProfileAvailable);
    }

    if let Some(name) = suggested {
        if let Some(pos) = profiles.iter().position(|p| p.name == name) {
            let profile = profiles.remove(pos);
            profiles.insert(0, profile);
        }
    }

    let profile = selector.select(&profiles)?;
    Ok(Resolution {
        profile,
        source: ProfileSource::Interactive,
    })
}
