use crate::settings::SETTINGS_FILE_NAME;
use std::path::{Path, PathBuf};

/// Facts about the invoking user and directory that end up in every docker command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContext {
    pub cwd: PathBuf,
    pub uid: u32,
    pub gid: u32,
    pub docker_bin: String,
}

impl HostContext {
    pub fn detect(cwd: PathBuf) -> Self {
        let (uid, gid) = current_ids();
        Self {
            cwd,
            uid,
            gid,
            docker_bin: resolve_docker_binary(),
        }
    }

    /// `uid:gid` as passed to `docker run -u`.
    pub fn user_spec(&self) -> String {
        format!("{}:{}", self.uid, self.gid)
    }
}

pub fn resolve_docker_binary() -> String {
    std::env::var("DOCKER_BIN")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "docker".to_string())
}

pub fn resolve_settings_path(cwd: &Path) -> PathBuf {
    match std::env::var("LAUNCHER_SETTINGS_FILE") {
        Ok(p) if !p.trim().is_empty() => cwd.join(p.trim()),
        _ => cwd.join(SETTINGS_FILE_NAME),
    }
}

#[cfg(unix)]
fn current_ids() -> (u32, u32) {
    (
        nix::unistd::getuid().as_raw(),
        nix::unistd::getgid().as_raw(),
    )
}

#[cfg(not(unix))]
fn current_ids() -> (u32, u32) {
    (0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_spec_joins_ids() {
        let host = HostContext {
            cwd: PathBuf::from("/work"),
            uid: 1000,
            gid: 100,
            docker_bin: "docker".to_string(),
        };
        assert_eq!(host.user_spec(), "1000:100");
    }

    #[cfg(unix)]
    #[test]
    fn detect_uses_real_ids() {
        let host = HostContext::detect(PathBuf::from("/work"));
        assert_eq!(host.uid, nix::unistd::getuid().as_raw());
        assert_eq!(host.gid, nix::unistd::getgid().as_raw());
        assert_eq!(host.cwd, PathBuf::from("/work"));
    }
}
