//! Standard paths used by sopsctl

use std::path::{Component, Path, PathBuf};

/// File name of the profile store inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Standard sopsctl paths
pub struct Paths {
    /// Config directory (~/.config/sopsctl)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("sopsctl");

        Self { config }
    }

    /// Default location of the profile store
    pub fn config_file(&self) -> PathBuf {
        self.config.join(CONFIG_FILE_NAME)
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Lexically clean a path: drop `.` components, fold `..` into its parent.
///
/// The filesystem is never consulted, so symlinks are not resolved and the
/// path does not need to exist.
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }

    if out.as_os_str().is_empty() {
        out.push(".");
    }

    out
}

/// Expand `~` and clean the result
pub fn normalize(path: &str) -> PathBuf {
    clean(&expand_tilde(path))
}

/// Whether `path` is `dir` itself or lies somewhere below it.
///
/// Compares whole components, so `/srv/app2` is not inside `/srv/app`.
pub fn is_within(path: &Path, dir: &Path) -> bool {
    path.starts_with(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean() {
        assert_eq!(clean(Path::new("/a/b/../c/./d/")), PathBuf::from("/a/c/d"));
        assert_eq!(clean(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(clean(Path::new("a/../..")), PathBuf::from(".."));
        assert_eq!(clean(Path::new("./")), PathBuf::from("."));
        assert_eq!(clean(Path::new("//srv//app")), PathBuf::from("/srv/app"));
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_tilde("~/work"), home.join("work"));
        assert_eq!(expand_tilde("/etc/sops"), PathBuf::from("/etc/sops"));
        assert_eq!(normalize("~/work/../infra/"), home.join("infra"));
    }

    #[test]
    fn test_is_within() {
        assert!(is_within(Path::new("/home/a/proj"), Path::new("/home/a/proj")));
        assert!(is_within(Path::new("/home/a/proj/sub/dir"), Path::new("/home/a/proj")));
        assert!(!is_within(Path::new("/home/a/proj2"), Path::new("/home/a/proj")));
        assert!(!is_within(Path::new("/home/a"), Path::new("/home/a/proj")));
    }

    #[test]
    fn test_config_file() {
        let paths = Paths::new();
        assert!(paths.config_file().ends_with("sopsctl/config.yaml"));
    }
}
