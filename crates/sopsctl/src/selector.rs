//! Interactive profile selection
//!
//! Uses `fzf` when it is installed and falls back to a numbered prompt.

use crate::error::{ProfileError, Result};
use crate::profile::Profile;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

/// fzf exit status for "no match"
const FZF_NO_MATCH: i32 = 1;
/// fzf exit status for Esc / Ctrl-C
const FZF_INTERRUPTED: i32 = 130;

/// Choose one profile from a list
pub trait Selector {
    /// Returns `SelectionCancelled` if the user backs out
    fn select<'a>(&self, profiles: &[&'a Profile]) -> Result<&'a Profile>;
}

/// One line per profile: name, description, backends
pub fn profile_label(profile: &Profile) -> String {
    format!(
        "{}  {}  [{}]",
        profile.name,
        profile.description.as_deref().unwrap_or(""),
        profile.backend_summary()
    )
}

/// Pick the best selector available on this machine
pub fn default_selector() -> Box<dyn Selector> {
    match which::which("fzf") {
        Ok(path) => Box::new(FzfSelector::new(path)),
        Err(_) => {
            debug!("fzf not found, using prompt selector");
            Box::new(PromptSelector)
        }
    }
}

/// Selection through an `fzf` subprocess
pub struct FzfSelector {
    fzf: PathBuf,
}

impl FzfSelector {
    pub fn new(fzf: PathBuf) -> Self {
        Self { fzf }
    }
}

impl Selector for FzfSelector {
    fn select<'a>(&self, profiles: &[&'a Profile]) -> Result<&'a Profile> {
        if profiles.is_empty() {
            return Err(ProfileError::NoProfileAvailable);
        }

        let mut child = Command::new(&self.fzf)
            .args([
                "--height=10",
                "--delimiter=\t",
                "--with-nth=2..",
                "--prompt=Select profile > ",
                "--header=Enter to select, Esc to cancel",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| ProfileError::Selector(format!("failed to start fzf: {}", e)))?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| ProfileError::Selector("fzf stdin unavailable".to_string()))?;
            // Index column is hidden from the user and parsed back below
            for (i, profile) in profiles.iter().enumerate() {
                writeln!(stdin, "{}\t{}", i, profile_label(profile))
                    .map_err(|e| ProfileError::Selector(e.to_string()))?;
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| ProfileError::Selector(e.to_string()))?;

        match output.status.code() {
            Some(0) => {}
            Some(FZF_NO_MATCH) | Some(FZF_INTERRUPTED) | None => {
                return Err(ProfileError::SelectionCancelled)
            }
            Some(code) => {
                return Err(ProfileError::Selector(format!("fzf exited with status {}", code)))
            }
        }

        let line = String::from_utf8_lossy(&output.stdout);
        line.split('\t')
            .next()
            .and_then(|index| index.trim().parse::<usize>().ok())
            .and_then(|i| profiles.get(i))
            .copied()
            .ok_or_else(|| {
                ProfileError::Selector(format!("unexpected fzf output: {}", line.trim()))
            })
    }
}

/// Numbered list on stderr, answer read from stdin
pub struct PromptSelector;

impl Selector for PromptSelector {
    fn select<'a>(&self, profiles: &[&'a Profile]) -> Result<&'a Profile> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stderr();
        prompt_select(profiles, &mut input, &mut output)
    }
}

/// Prompt for a profile by number or name.
///
/// An empty answer, `q`, or end of input cancels.
pub fn prompt_select<'a, R: BufRead, W: Write>(
    profiles: &[&'a Profile],
    input: &mut R,
    output: &mut W,
) -> Result<&'a Profile> {
    if profiles.is_empty() {
        return Err(ProfileError::NoProfileAvailable);
    }

    let prompt_err = |e: io::Error| ProfileError::Selector(e.to_string());

    writeln!(output, "Available profiles:").map_err(prompt_err)?;
    for (i, profile) in profiles.iter().enumerate() {
        writeln!(output, "  {}) {}", i + 1, profile_label(profile)).map_err(prompt_err)?;
    }
    write!(output, "Select profile [1-{}, q to cancel]: ", profiles.len()).map_err(prompt_err)?;
    output.flush().map_err(prompt_err)?;

    let mut answer = String::new();
    input.read_line(&mut answer).map_err(prompt_err)?;
    let answer = answer.trim();

    if answer.is_empty() || answer.eq_ignore_ascii_case("q") {
        return Err(ProfileError::SelectionCancelled);
    }

    if let Ok(n) = answer.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|i| profiles.get(i))
            .copied()
            .ok_or_else(|| ProfileError::Selector(format!("no profile numbered {}", n)));
    }

    profiles
        .iter()
        .find(|p| p.name == answer)
        .copied()
        .ok_or_else(|| ProfileError::NotFound(answer.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn profiles() -> Vec<Profile> {
        vec![
            Profile::new("dev")
                .with_description("Development")
                .with_recipients(["age1dev"]),
            Profile::new("prod").with_recipients(["age1prod"]),
        ]
    }

    fn ask(answer: &str) -> Result<String> {
        let owned = profiles();
        let refs: Vec<&Profile> = owned.iter().collect();
        let mut input = Cursor::new(answer.as_bytes().to_vec());
        let mut output = Vec::new();
        prompt_select(&refs, &mut input, &mut output).map(|p| p.name.clone())
    }

    #[test]
    fn test_profile_label() {
        let owned = profiles();
        assert_eq!(profile_label(&owned[0]), "dev  Development  [age]");
        assert_eq!(profile_label(&Profile::new("bare")), "bare    [none]");
    }

    #[test]
    fn test_prompt_by_number_and_name() {
        assert_eq!(ask("2\n").unwrap(), "prod");
        assert_eq!(ask("dev\n").unwrap(), "dev");
    }

    #[test]
    fn test_prompt_cancel() {
        assert!(matches!(ask("\n"), Err(ProfileError::SelectionCancelled)));
        assert!(matches!(ask("q\n"), Err(ProfileError::SelectionCancelled)));
        // EOF
        assert!(matches!(ask(""), Err(ProfileError::SelectionCancelled)));
    }

    #[test]
    fn test_prompt_invalid() {
        assert!(matches!(ask("0\n"), Err(ProfileError::Selector(_))));
        assert!(matches!(ask("7\n"), Err(ProfileError::Selector(_))));
        assert!(matches!(ask("staging\n"), Err(ProfileError::NotFound(_))));
    }

    #[test]
    fn test_prompt_lists_profiles() {
        let owned = profiles();
        let refs: Vec<&Profile> = owned.iter().collect();
        let mut input = Cursor::new(b"1\n".to_vec());
        let mut output = Vec::new();
        prompt_select(&refs, &mut input, &mut output).unwrap();

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("1) dev  Development  [age]"));
        assert!(shown.contains("2) prod    [age]"));
    }

    #[cfg(unix)]
    fn fake_fzf(dir: &std::path::Path, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_fzf_name_with_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let owned = vec![
            Profile::new("team prod").with_recipients(["age1team"]),
            Profile::new("team").with_recipients(["age1other"]),
        ];
        let refs: Vec<&Profile> = owned.iter().collect();

        let script = "input=$(cat); echo \"$input\" | head -n1";
        let first = FzfSelector::new(fake_fzf(dir.path(), "first", script));
        assert_eq!(first.select(&refs).unwrap().name, "team prod");

        let script = "input=$(cat); echo \"$input\" | sed -n 2p";
        let second = FzfSelector::new(fake_fzf(dir.path(), "second", script));
        assert_eq!(second.select(&refs).unwrap().name, "team");
    }

    #[cfg(unix)]
    #[test]
    fn test_fzf_cancel_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let owned = profiles();
        let refs: Vec<&Profile> = owned.iter().collect();

        let cancelled = FzfSelector::new(fake_fzf(dir.path(), "esc", "cat >/dev/null; exit 130"));
        assert!(matches!(cancelled.select(&refs), Err(ProfileError::SelectionCancelled)));

        let garbage = FzfSelector::new(fake_fzf(dir.path(), "garbage", "cat >/dev/null; echo 9"));
        assert!(matches!(garbage.select(&refs), Err(ProfileError::Selector(_))));
    }

    #[test]
    fn test_prompt_empty_list() {
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        assert!(matches!(
            prompt_select(&[], &mut input, &mut output),
            Err(ProfileError::NoProfileAvailable)
        ));
    }
}
