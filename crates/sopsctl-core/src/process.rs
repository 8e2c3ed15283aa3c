//! Process management utilities

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::paths::expand_tilde;

/// Locate an executable.
///
/// Bare names are searched on `PATH`; anything containing a separator
/// (after `~` expansion) is checked as a path.
pub fn find_binary(name: &str) -> Result<PathBuf, which::Error> {
    which::which(expand_tilde(name))
}

/// Run a program with inherited stdin/stdout/stderr and wait for it.
///
/// Returns the child's exit code. A child killed by a signal reports
/// `128 + signal`, the shell convention.
pub fn run_inherited(
    program: &Path,
    args: &[String],
    envs: &[(String, String)],
) -> io::Result<i32> {
    let status = Command::new(program)
        .args(args)
        .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .status()?;

    if let Some(code) = status.code() {
        return Ok(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Ok(128 + signal);
        }
    }

    Ok(1)
}

/// Quote a single argument for display in a POSIX shell
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:@,+%^".contains(c));

    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// Render a command line the way a user would type it
pub fn render_command(program: &str, args: &[String]) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(shell_quote(program));
    parts.extend(args.iter().map(|a| shell_quote(a)));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("secret.yaml"), "secret.yaml");
        assert_eq!(shell_quote("--age"), "--age");
        assert_eq!(shell_quote("^(data|stringData)$"), "'^(data|stringData)$'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_render_command() {
        let args: Vec<String> = ["--age", "age1abc", "encrypt", "my file.yaml"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(render_command("sops", &args), "sops --age age1abc encrypt 'my file.yaml'");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_inherited_exit_codes() {
        let sh = find_binary("sh").unwrap();

        let ok = run_inherited(&sh, &["-c".to_string(), "exit 0".to_string()], &[]).unwrap();
        assert_eq!(ok, 0);

        let failed = run_inherited(&sh, &["-c".to_string(), "exit 3".to_string()], &[]).unwrap();
        assert_eq!(failed, 3);

        let killed = run_inherited(&sh, &["-c".to_string(), "kill -TERM $$".to_string()], &[])
            .unwrap();
        assert_eq!(killed, 128 + 15);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_inherited_env() {
        let sh = find_binary("sh").unwrap();
        let envs = vec![("SOPSCTL_TEST_VALUE".to_string(), "42".to_string())];
        let code = run_inherited(
            &sh,
            &["-c".to_string(), "exit $SOPSCTL_TEST_VALUE".to_string()],
            &envs,
        )
        .unwrap();
        assert_eq!(code, 42);
    }

    #[test]
    fn test_find_binary_missing() {
        assert!(find_binary("sopsctl-definitely-not-a-real-binary").is_err());
    }
}
