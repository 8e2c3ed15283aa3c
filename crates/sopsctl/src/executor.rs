//! Running sops

use crate::error::{ProfileError, Result};
use sopsctl_core::process::{find_binary, render_command, run_inherited, shell_quote};
use tracing::debug;

/// Runs the external sops binary, or prints what it would run
pub struct Executor {
    sops_path: String,
    dry_run: bool,
}

impl Executor {
    pub fn new(sops_path: &str, dry_run: bool) -> Self {
        Self {
            sops_path: sops_path.to_string(),
            dry_run,
        }
    }

    /// The command line as it would be typed, environment first
    pub fn render(&self, args: &[String], envs: &[(String, String)]) -> String {
        let command = render_command(&self.sops_path, args);
        if envs.is_empty() {
            return command;
        }

        let assignments: Vec<String> = envs
            .iter()
            .map(|(k, v)| format!("{}={}", k, shell_quote(v)))
            .collect();
        format!("{} {}", assignments.join(" "), command)
    }

    /// Run sops and return its exit code. Dry runs print and return 0.
    pub fn run(&self, args: &[String], envs: &[(String, String)]) -> Result<i32> {
        if self.dry_run {
            println!("{}", self.render(args, envs));
            return Ok(0);
        }

        let program = find_binary(&self.sops_path).map_err(|source| ProfileError::ToolNotFound {
            path: self.sops_path.clone(),
            source,
        })?;

        debug!(program = %program.display(), ?args, "running sops");
        let code = run_inherited(&program, args, envs).map_err(|e| ProfileError::io(&program, e))?;
        debug!(code, "sops exited");

        Ok(code)
    }
}
