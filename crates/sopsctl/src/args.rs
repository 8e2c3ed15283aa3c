//! sops argument building
//!
//! Profile flags come first, the operation and target file last:
//!
//! ```text
//! sops --age <r1> --age <r2> [--encrypted-regex ...] encrypt secret.yaml
//! ```
//!
//! Recipients keep their stored order.

use crate::profile::Profile;

/// Environment variable sops reads the age identity file from
pub const AGE_KEY_FILE_ENV: &str = "SOPS_AGE_KEY_FILE";

fn age_flags(profile: &Profile, args: &mut Vec<String>) {
    for recipient in profile.recipients() {
        args.push("--age".to_string());
        args.push(recipient.clone());
    }
}

/// Arguments for `operation` on `file` using `profile`
pub fn build(profile: &Profile, operation: &str, file: &str) -> Vec<String> {
    let mut args = Vec::with_capacity(16);

    age_flags(profile, &mut args);

    for (flag, value) in profile.sops.flags() {
        args.push(flag.to_string());
        args.push(value.to_string());
    }

    args.push(operation.to_string());
    args.push(file.to_string());
    args
}

/// Decryption reads keys from the file metadata, no profile flags
pub fn build_decrypt(file: &str) -> Vec<String> {
    vec!["decrypt".to_string(), file.to_string()]
}

/// Without a profile sops picks up the existing file's metadata
pub fn build_edit(profile: Option<&Profile>, file: &str) -> Vec<String> {
    match profile {
        Some(profile) => build(profile, "edit", file),
        None => vec!["edit".to_string(), file.to_string()],
    }
}

/// Recipient flags followed by raw user arguments
pub fn build_exec(profile: &Profile, extra: &[String]) -> Vec<String> {
    let mut args = Vec::with_capacity(extra.len() + 2 * profile.recipients().len());
    age_flags(profile, &mut args);
    args.extend(extra.iter().cloned());
    args
}

/// Environment to pass to sops for this profile
pub fn profile_env(profile: &Profile) -> Vec<(String, String)> {
    profile
        .key_file_path()
        .map(|path| (AGE_KEY_FILE_ENV.to_string(), path.to_string_lossy().into_owned()))
        .into_iter()
        .collect()
}

/// `export SOPS_AGE_KEY_FILE="..."` for shell integration
pub fn export_line(profile: &Profile) -> Option<String> {
    profile
        .key_file_path()
        .map(|path| format!("export {}=\"{}\"", AGE_KEY_FILE_ENV, path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::SopsOptions;

    fn team() -> Profile {
        Profile::new("team").with_recipients(["k1", "k2"])
    }

    #[test]
    fn test_build_recipients_in_order() {
        assert_eq!(
            build(&team(), "encrypt", "secret.yaml"),
            vec!["--age", "k1", "--age", "k2", "encrypt", "secret.yaml"]
        );

        // Not sorted
        let reversed = Profile::new("r").with_recipients(["zz", "aa"]);
        assert_eq!(
            build(&reversed, "encrypt", "s.yaml"),
            vec!["--age", "zz", "--age", "aa", "encrypt", "s.yaml"]
        );
    }

    #[test]
    fn test_build_sops_options() {
        let profile = team().with_sops(SopsOptions {
            encrypted_regex: Some("^(data|stringData)$".to_string()),
            encrypted_suffix: Some("_secret".to_string()),
            unencrypted_regex: Some("^description$".to_string()),
            unencrypted_suffix: Some("_plain".to_string()),
        });

        assert_eq!(
            build(&profile, "encrypt", "values.yaml"),
            vec![
                "--age",
                "k1",
                "--age",
                "k2",
                "--encrypted-regex",
                "^(data|stringData)$",
                "--encrypted-suffix",
                "_secret",
                "--unencrypted-regex",
                "^description$",
                "--unencrypted-suffix",
                "_plain",
                "encrypt",
                "values.yaml",
            ]
        );
    }

    #[test]
    fn test_build_skips_empty_options() {
        let profile = team().with_sops(SopsOptions {
            encrypted_regex: Some(String::new()),
            unencrypted_suffix: Some("_plain".to_string()),
            ..SopsOptions::default()
        });

        assert_eq!(
            build(&profile, "encrypt", "a.yaml"),
            vec![
                "--age",
                "k1",
                "--age",
                "k2",
                "--unencrypted-suffix",
                "_plain",
                "encrypt",
                "a.yaml",
            ]
        );
    }

    #[test]
    fn test_build_without_backend() {
        assert_eq!(build(&Profile::new("bare"), "encrypt", "a.yaml"), vec!["encrypt", "a.yaml"]);
    }

    #[test]
    fn test_build_decrypt() {
        assert_eq!(build_decrypt("secret.yaml"), vec!["decrypt", "secret.yaml"]);
    }

    #[test]
    fn test_build_edit() {
        assert_eq!(build_edit(None, "secret.yaml"), vec!["edit", "secret.yaml"]);
        assert_eq!(
            build_edit(Some(&team()), "secret.yaml"),
            vec!["--age", "k1", "--age", "k2", "edit", "secret.yaml"]
        );
    }

    #[test]
    fn test_build_exec() {
        let profile = team().with_sops(SopsOptions {
            encrypted_regex: Some("^data$".to_string()),
            ..SopsOptions::default()
        });
        let extra = vec!["--in-place".to_string(), "encrypt".to_string(), "s.yaml".to_string()];

        assert_eq!(
            build_exec(&profile, &extra),
            vec!["--age", "k1", "--age", "k2", "--in-place", "encrypt", "s.yaml"]
        );
    }

    #[test]
    fn test_profile_env_and_export() {
        assert!(profile_env(&team()).is_empty());
        assert_eq!(export_line(&team()), None);

        let profile = team().with_key_file("/etc/sops/age/keys.txt");
        assert_eq!(
            profile_env(&profile),
            vec![(AGE_KEY_FILE_ENV.to_string(), "/etc/sops/age/keys.txt".to_string())]
        );
        assert_eq!(
            export_line(&profile).unwrap(),
            "export SOPS_AGE_KEY_FILE=\"/etc/sops/age/keys.txt\""
        );
    }
}
