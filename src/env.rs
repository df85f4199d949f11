use anyhow::Result;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Load `<cwd>/.env` into the process env, if present.
/// Returns whether a file was loaded.
pub fn load_env(cwd: &Path) -> Result<bool> {
    let base = cwd.join(".env");
    if !base.exists() {
        return Ok(false);
    }
    dotenvy::from_path(&base)?;
    Ok(true)
}

/// Log to stderr so the prompt screen and child output stay clean.
/// Level comes from `RUST_LOG`, defaulting to `warn`.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_env_without_file_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!load_env(dir.path()).unwrap());
    }

    #[test]
    fn load_env_reads_dotenv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "IONIC_LAUNCHER_TEST_VAR=from-dotenv\n").unwrap();

        assert!(load_env(dir.path()).unwrap());
        assert_eq!(std::env::var("IONIC_LAUNCHER_TEST_VAR").unwrap(), "from-dotenv");
    }
}
