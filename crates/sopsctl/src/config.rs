//! Profile store
//!
//! Configuration file: ~/.config/sopsctl/config.yaml
//!
//! ```yaml
//! profiles:
//!   dev:
//!     description: Development
//!     age:
//!       recipients: [age1...]
//! default_profile: dev
//! directories:
//!   ~/work/infra:
//!     profile: dev
//!     auto: true
//! settings:
//!   sops_path: sops
//! ```

use crate::error::{ProfileError, Result};
use crate::profile::Profile;
use serde::{Deserialize, Serialize};
use sopsctl_core::paths::normalize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Binary used when no sops path is configured
pub const DEFAULT_SOPS_PATH: &str = "sops";

/// The profile store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Profiles keyed by name
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,

    /// Profile used when nothing more specific applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,

    /// Directory to profile mappings, keys may use `~`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub directories: BTreeMap<String, DirectoryMapping>,

    /// Tool settings
    #[serde(default, skip_serializing_if = "Settings::is_empty")]
    pub settings: Settings,
}

/// A directory's profile assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryMapping {
    /// Profile name
    pub profile: String,

    /// Apply without asking
    #[serde(default)]
    pub auto: bool,
}

/// Tool settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Path or name of the sops binary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sops_path: Option<String>,
}

impl Settings {
    fn is_empty(&self) -> bool {
        self.sops_path.is_none()
    }
}

impl Config {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store from a file.
    ///
    /// A missing file is `ConfigNotFound`; callers that can start from
    /// scratch use [`Config::load_or_default`].
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProfileError::ConfigNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(ProfileError::io(path, e)),
        };

        let config = Self::from_yaml(&content).map_err(|source| ProfileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), profiles = config.profiles.len(), "loaded config");
        Ok(config)
    }

    /// Load the store, or start empty if the file does not exist yet
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load_from(path) {
            Err(ProfileError::ConfigNotFound(_)) => {
                debug!(path = %path.display(), "no config yet, starting empty");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parse YAML content, filling profile names from their keys
    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut config: Self = serde_yaml::from_str(content)?;
        for (name, profile) in config.profiles.iter_mut() {
            profile.name = name.clone();
        }
        Ok(config)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(ProfileError::Serialize)
    }

    /// Save the store, replacing the file atomically.
    ///
    /// The content is written to a temporary file next to the target and
    /// renamed over it, so a failure leaves the previous file intact.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        std::fs::create_dir_all(parent).map_err(|e| ProfileError::io(parent, e))?;

        let content = self.to_yaml()?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| ProfileError::io(parent, e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| ProfileError::io(tmp.path(), e))?;
        tmp.persist(path)
            .map_err(|e| ProfileError::io(path, e.error))?;

        debug!(path = %path.display(), "saved config");
        Ok(())
    }

    /// Add a new profile
    pub fn add_profile(&mut self, profile: Profile) -> Result<()> {
        if self.profiles.contains_key(&profile.name) {
            return Err(ProfileError::DuplicateName(profile.name));
        }
        profile.validate()?;

        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    /// Remove a profile, clearing the default if it pointed here
    pub fn remove_profile(&mut self, name: &str) -> Result<Profile> {
        let profile = self
            .profiles
            .remove(name)
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))?;

        if self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }

        Ok(profile)
    }

    /// Look up a profile
    pub fn get_profile(&self, name: &str) -> Result<&Profile> {
        self.profiles
            .get(name)
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))
    }

    /// All profiles, in name order
    pub fn list_profiles(&self) -> Vec<&Profile> {
        self.profiles.values().collect()
    }

    /// The configured default profile name, if any
    pub fn default_profile(&self) -> Option<&str> {
        self.default_profile.as_deref().filter(|n| !n.is_empty())
    }

    /// Set the default profile. Existence is checked when it is used.
    pub fn set_default_profile(&mut self, name: &str) {
        self.default_profile = Some(name.to_string());
    }

    pub fn clear_default_profile(&mut self) {
        self.default_profile = None;
    }

    /// Map a directory to a profile.
    ///
    /// Two spellings of the same directory (`~/x` and `/home/me/x`) count
    /// as duplicates.
    pub fn map_directory(&mut self, dir: &str, profile: &str, auto: bool) -> Result<()> {
        self.get_profile(profile)?;

        let normalized = normalize(dir);
        if let Some(existing) = self
            .directories
            .keys()
            .find(|key| normalize(key) == normalized)
        {
            return Err(ProfileError::DuplicateDirectory(existing.clone()));
        }

        self.directories.insert(
            dir.to_string(),
            DirectoryMapping {
                profile: profile.to_string(),
                auto,
            },
        );
        Ok(())
    }

    /// Remove a directory mapping, matching on the normalized path
    pub fn unmap_directory(&mut self, dir: &str) -> Result<DirectoryMapping> {
        let normalized = normalize(dir);
        let key = self
            .directories
            .keys()
            .find(|key| normalize(key) == normalized)
            .cloned()
            .ok_or_else(|| ProfileError::DirectoryNotMapped(dir.to_string()))?;

        self.directories
            .remove(&key)
            .ok_or(ProfileError::DirectoryNotMapped(key))
    }

    /// Directories mapped to the given profile
    pub fn directories_for(&self, profile: &str) -> Vec<&str> {
        self.directories
            .iter()
            .filter(|(_, mapping)| mapping.profile == profile)
            .map(|(dir, _)| dir.as_str())
            .collect()
    }

    /// Path or name of the sops binary
    pub fn sops_path(&self) -> &str {
        self.settings
            .sops_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_SOPS_PATH)
    }

    pub fn set_sops_path(&mut self, path: &str) {
        self.settings.sops_path = Some(path.to_string());
    }
}
