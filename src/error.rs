use thiserror::Error;

/// Failures the launcher distinguishes from generic I/O errors.
#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("'{key}' is not defined in section '{section}'")]
    MissingSetting { section: String, key: String },

    #[error("invalid value '{value}' for '{key}' in section '{section}'")]
    InvalidSetting {
        section: String,
        key: String,
        value: String,
    },

    #[error("no docker images available{}", .filter.as_deref().map(|f| format!(" matching '{f}'")).unwrap_or_default())]
    NoImages { filter: Option<String> },

    #[error("'{name}' is not a usable app name; use letters, digits, '.', '_' or '-'")]
    InvalidAppName { name: String },

    #[error("command failed (exit {code:?}): {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// A prompt was aborted with Ctrl-C or Esc.
    #[error("cancelled")]
    Cancelled,

    /// A streaming child received a forwarded interrupt.
    #[error("interrupted")]
    Interrupted,
}

impl LauncherError {
    /// Errors that end the current action with a message instead of failing the program.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            LauncherError::MissingSetting { .. }
                | LauncherError::InvalidSetting { .. }
                | LauncherError::NoImages { .. }
                | LauncherError::InvalidAppName { .. }
        )
    }
}
