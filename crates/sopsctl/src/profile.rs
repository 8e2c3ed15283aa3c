//! Encryption profiles
//!
//! A profile bundles everything sops needs to know about *who* can read a
//! file (age recipients) and *which* parts of it get encrypted (the
//! encrypted/unencrypted regex and suffix options).

use crate::error::{ProfileError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sopsctl_core::paths::expand_tilde;
use std::path::{Path, PathBuf};

/// Comment prefix age-keygen writes in front of the public key
const PUBLIC_KEY_PREFIX: &str = "# public key:";

/// A named encryption profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name, populated from the key in the store
    #[serde(skip)]
    pub name: String,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// age backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<AgeConfig>,

    /// sops formatting options
    #[serde(default, skip_serializing_if = "SopsOptions::is_empty")]
    pub sops: SopsOptions,
}

/// age backend configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeConfig {
    /// Identity file handed to sops through SOPS_AGE_KEY_FILE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,

    /// Recipient public keys, in the order they are passed to sops
    #[serde(default)]
    pub recipients: Vec<String>,
}

/// sops options controlling which keys get encrypted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SopsOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_regex: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_suffix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unencrypted_regex: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unencrypted_suffix: Option<String>,
}

impl SopsOptions {
    pub fn is_empty(&self) -> bool {
        self.flags().next().is_none()
    }

    /// Non-empty options as `(flag, value)` pairs, in sops flag order
    pub fn flags(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        [
            ("--encrypted-regex", &self.encrypted_regex),
            ("--encrypted-suffix", &self.encrypted_suffix),
            ("--unencrypted-regex", &self.unencrypted_regex),
            ("--unencrypted-suffix", &self.unencrypted_suffix),
        ]
        .into_iter()
        .filter_map(|(flag, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (flag, v))
        })
    }

    /// Check that both regex options compile
    pub fn validate(&self) -> Result<()> {
        let regexes = [
            ("encrypted-regex", &self.encrypted_regex),
            ("unencrypted-regex", &self.unencrypted_regex),
        ];

        for (field, value) in regexes {
            if let Some(pattern) = value.as_deref().filter(|v| !v.is_empty()) {
                Regex::new(pattern).map_err(|e| ProfileError::InvalidRegex {
                    field,
                    message: e.to_string(),
                })?;
            }
        }

        Ok(())
    }
}

impl Profile {
    /// Create an empty profile
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Append age recipients
    pub fn with_recipients<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.age
            .get_or_insert_with(AgeConfig::default)
            .recipients
            .extend(recipients.into_iter().map(Into::into));
        self
    }

    /// Set the age identity file
    pub fn with_key_file(mut self, key_file: &str) -> Self {
        self.age.get_or_insert_with(AgeConfig::default).key_file = Some(key_file.to_string());
        self
    }

    /// Set the sops options
    pub fn with_sops(mut self, sops: SopsOptions) -> Self {
        self.sops = sops;
        self
    }

    /// age recipients, empty when there is no age backend
    pub fn recipients(&self) -> &[String] {
        self.age
            .as_ref()
            .map(|age| age.recipients.as_slice())
            .unwrap_or(&[])
    }

    /// The identity file with `~` expanded
    pub fn key_file_path(&self) -> Option<PathBuf> {
        self.age
            .as_ref()
            .and_then(|age| age.key_file.as_deref())
            .filter(|k| !k.is_empty())
            .map(expand_tilde)
    }

    /// True if at least one backend is configured
    pub fn has_backends(&self) -> bool {
        !self.recipients().is_empty() || self.key_file_path().is_some()
    }

    /// Short backend summary for listings
    pub fn backend_summary(&self) -> &'static str {
        if self.has_backends() {
            "age"
        } else {
            "none"
        }
    }

    /// Validate a profile before it is created
    pub fn validate(&self) -> Result<()> {
        if !self.has_backends() {
            return Err(ProfileError::MissingBackend);
        }
        self.sops.validate()
    }
}

/// Read the public keys age-keygen records as comments in an identity file
pub fn public_keys_from_key_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| ProfileError::io(path, e))?;

    Ok(content
        .lines()
        .filter_map(|line| line.trim().strip_prefix(PUBLIC_KEY_PREFIX))
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_profile_builder() {
        let profile = Profile::new("dev")
            .with_description("Development")
            .with_recipients(["age1abc", "age1def"]);

        assert_eq!(profile.name, "dev");
        assert_eq!(profile.description.as_deref(), Some("Development"));
        assert_eq!(profile.recipients(), ["age1abc", "age1def"]);
        assert_eq!(profile.backend_summary(), "age");
    }

    #[test]
    fn test_no_backends() {
        let profile = Profile::new("empty");
        assert!(!profile.has_backends());
        assert_eq!(profile.backend_summary(), "none");
        assert!(matches!(profile.validate(), Err(ProfileError::MissingBackend)));

        // An age block without recipients or key file still counts as none
        let profile = Profile {
            age: Some(AgeConfig::default()),
            ..Profile::new("hollow")
        };
        assert_eq!(profile.backend_summary(), "none");
    }

    #[test]
    fn test_key_file_counts_as_backend() {
        let profile = Profile::new("dev").with_key_file("~/.config/sops/age/keys.txt");
        assert!(profile.has_backends());
        assert!(profile.validate().is_ok());

        let path = profile.key_file_path().unwrap();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with(".config/sops/age/keys.txt"));
    }

    #[test]
    fn test_sops_flags_order() {
        let sops = SopsOptions {
            encrypted_regex: Some("^data$".to_string()),
            encrypted_suffix: None,
            unencrypted_regex: Some(String::new()),
            unencrypted_suffix: Some("_plain".to_string()),
        };

        let flags: Vec<_> = sops.flags().collect();
        assert_eq!(
            flags,
            vec![("--encrypted-regex", "^data$"), ("--unencrypted-suffix", "_plain")]
        );
        assert!(!sops.is_empty());
        assert!(SopsOptions::default().is_empty());
    }

    #[test]
    fn test_invalid_regex() {
        let profile = Profile::new("bad")
            .with_recipients(["age1abc"])
            .with_sops(SopsOptions {
                encrypted_regex: Some("^(data".to_string()),
                ..SopsOptions::default()
            });

        match profile.validate() {
            Err(ProfileError::InvalidRegex { field, .. }) => assert_eq!(field, "encrypted-regex"),
            other => panic!("Expected InvalidRegex, got {:?}", other),
        }
    }

    #[test]
    fn test_public_keys_from_key_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        std::fs::write(
            &path,
            "# created: 2024-01-01T00:00:00Z\n\
             # public key: age1first\n\
             AGE-SECRET-KEY-1AAAA\n\
             # public key: age1second\n\
             AGE-SECRET-KEY-1BBBB\n",
        )
        .unwrap();

        let keys = public_keys_from_key_file(&path).unwrap();
        assert_eq!(keys, vec!["age1first", "age1second"]);

        let missing = public_keys_from_key_file(&dir.path().join("nope.txt"));
        assert!(matches!(missing, Err(ProfileError::Io { .. })));
    }
}
