//! Opening the config file in the user's editor

use crate::error::{ProfileError, Result};
use std::path::Path;
use std::process::Command;

/// Editor used when $EDITOR is unset
pub const DEFAULT_EDITOR: &str = "vim";

/// Launch an external editor on a file and wait for it
pub trait Editor {
    fn edit(&self, path: &Path) -> Result<()>;
}

/// The editor named by $EDITOR
pub struct EnvEditor {
    command: String,
}

impl EnvEditor {
    pub fn from_env() -> Self {
        let command = std::env::var("EDITOR")
            .ok()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EDITOR.to_string());
        Self::new(&command)
    }

    /// `command` may carry arguments, e.g. `code --wait`
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
        }
    }
}

impl Editor for EnvEditor {
    fn edit(&self, path: &Path) -> Result<()> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| ProfileError::Editor("no editor configured".to_string()))?;

        let status = Command::new(program)
            .args(parts)
            .arg(path)
            .status()
            .map_err(|e| ProfileError::Editor(format!("failed to open {}: {}", program, e)))?;

        if !status.success() {
            return Err(ProfileError::Editor(format!("{} exited with {}", program, status)));
        }

        Ok(())
    }
}
