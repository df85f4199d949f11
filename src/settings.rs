use crate::error::LauncherError;
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE_NAME: &str = ".local_settings.ini";

pub const DOCKER_SECTION: &str = "Docker";
pub const APP_SECTION: &str = "App";

pub const IMAGE_NAME_KEY: &str = "image_name";
pub const APP_NAME_KEY: &str = "name";
pub const DEV_PORT_KEY: &str = "development_port";

pub const DEFAULT_DEV_PORT: &str = "8100";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Sectioned key/value store backed by an INI file.
///
/// Loaded once and rewritten whole on every `set`. Keys are lower-cased and
/// the output stays readable by any standard INI parser.
#[derive(Debug, Clone)]
pub struct Settings {
    path: PathBuf,
    sections: Vec<Section>,
}

impl Settings {
    /// Load from `path`. A missing or unreadable file yields an empty store;
    /// malformed lines are skipped with a warning and the rest is kept.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let sections = match fs::read_to_string(&path) {
            Ok(text) => {
                let (sections, errors) = parse(&text);
                for e in &errors {
                    tracing::warn!("{}: skipping {e}", path.display());
                }
                sections
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!("cannot read settings file {}: {e}", path.display());
                Vec::new()
            }
        };
        tracing::debug!("loaded {} settings section(s) from {}", sections.len(), path.display());
        Self { path, sections }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let key = normalize_key(key);
        self.sections
            .iter()
            .find(|s| s.name == section)?
            .entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_or<'a>(&'a self, section: &str, key: &str, fallback: &'a str) -> &'a str {
        self.get(section, key).unwrap_or(fallback)
    }

    pub fn require(&self, section: &str, key: &str) -> Result<&str, LauncherError> {
        self.get(section, key).ok_or_else(|| LauncherError::MissingSetting {
            section: section.to_string(),
            key: key.to_string(),
        })
    }

    /// Upsert `key = value` under `section`, then rewrite the file. The value
    /// is trimmed, as it would be when read back.
    pub fn set(&mut self, section: &str, key: &str, value: &str) -> Result<()> {
        let key = normalize_key(key);
        let value = value.trim();
        let idx = match self.sections.iter().position(|s| s.name == section) {
            Some(i) => i,
            None => {
                self.sections.push(Section {
                    name: section.to_string(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        let entries = &mut self.sections[idx].entries;
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => entries.push((key, value.to_string())),
        }
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        fs::write(&self.path, self.render())
            .with_context(|| format!("writing settings to {}", self.path.display()))?;
        tracing::debug!("saved settings to {}", self.path.display());
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push_str(&format!("[{}]\n", section.name));
            for (k, v) in &section.entries {
                out.push_str(&format!("{k} = {v}\n"));
            }
            out.push('\n');
        }
        out
    }

    /// Configured development port, falling back to 8100.
    pub fn dev_port(&self) -> Result<u16, LauncherError> {
        let raw = self.get_or(APP_SECTION, DEV_PORT_KEY, DEFAULT_DEV_PORT);
        raw.trim().parse::<u16>().map_err(|_| LauncherError::InvalidSetting {
            section: APP_SECTION.to_string(),
            key: DEV_PORT_KEY.to_string(),
            value: raw.to_string(),
        })
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Parse what can be parsed. Malformed lines are skipped and reported, and so
/// are entries that follow an unreadable section header.
fn parse(text: &str) -> (Vec<Section>, Vec<ParseError>) {
    let mut sections: Vec<Section> = Vec::new();
    let mut errors = Vec::new();
    let mut current: Option<usize> = None;

    for (n, raw) in text.lines().enumerate() {
        let line_no = n + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let Some(name) = rest.strip_suffix(']') else {
                errors.push(ParseError {
                    line: line_no,
                    message: format!("unterminated section header: {line}"),
                });
                current = None;
                continue;
            };
            current = match sections.iter().position(|s| s.name == name) {
                Some(i) => Some(i),
                None => {
                    sections.push(Section {
                        name: name.to_string(),
                        entries: Vec::new(),
                    });
                    Some(sections.len() - 1)
                }
            };
            continue;
        }

        let Some(idx) = current else {
            errors.push(ParseError {
                line: line_no,
                message: "entry outside of any section".to_string(),
            });
            continue;
        };

        // split on whichever delimiter comes first
        let Some(pos) = line.find(&['=', ':'][..]) else {
            errors.push(ParseError {
                line: line_no,
                message: format!("expected 'key = value': {line}"),
            });
            continue;
        };
        let key = normalize_key(&line[..pos]);
        let value = line[pos + 1..].trim().to_string();
        if key.is_empty() {
            errors.push(ParseError {
                line: line_no,
                message: "empty key".to_string(),
            });
            continue;
        }
        let entries = &mut sections[idx].entries;
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => entries.push((key, value)),
        }
    }

    (sections, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> Settings {
        Settings::load(dir.path().join(SETTINGS_FILE_NAME))
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = store_in(&dir);
        s.set("Docker", "image_name", "acme/app").unwrap();

        assert_eq!(s.get("Docker", "image_name"), Some("acme/app"));

        let reloaded = store_in(&dir);
        assert_eq!(reloaded.get("Docker", "image_name"), Some("acme/app"));
    }

    #[test]
    fn missing_key_uses_fallback_or_reports_absence() {
        let dir = tempfile::tempdir().unwrap();
        let s = store_in(&dir);

        assert_eq!(s.get_or("App", "development_port", "8100"), "8100");
        let err = s.require("App", "name").unwrap_err();
        assert!(matches!(err, LauncherError::MissingSetting { ref section, ref key } if section == "App" && key == "name"));
    }

    #[test]
    fn update_keeps_unrelated_keys_and_sections() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = store_in(&dir);
        s.set("App", "name", "demo").unwrap();
        s.set("App", "development_port", "8200").unwrap();
        s.set("Docker", "image_name", "t08094a/ionic").unwrap();

        s.set("App", "name", "other").unwrap();

        let reloaded = store_in(&dir);
        assert_eq!(reloaded.get("App", "name"), Some("other"));
        assert_eq!(reloaded.get("App", "development_port"), Some("8200"));
        assert_eq!(reloaded.get("Docker", "image_name"), Some("t08094a/ionic"));
    }

    #[test]
    fn renders_ini_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = store_in(&dir);
        s.set("Docker", "image_name", "acme/app").unwrap();
        s.set("App", "name", "demo").unwrap();

        let text = fs::read_to_string(dir.path().join(SETTINGS_FILE_NAME)).unwrap();
        assert_eq!(text, "[Docker]\nimage_name = acme/app\n\n[App]\nname = demo\n\n");
    }

    #[test]
    fn parses_comments_colons_and_mixed_case_keys() {
        let text = "; generated\n[App]\nName = demo\n# port override\ndevelopment_port: 8200\n\n[Docker]\nimage_name=acme/app:latest\n";
        let (sections, errors) = parse(text);
        assert!(errors.is_empty());
        let s = Settings {
            path: PathBuf::from("unused"),
            sections,
        };

        assert_eq!(s.get("App", "name"), Some("demo"));
        assert_eq!(s.get("App", "development_port"), Some("8200"));
        // only the first delimiter splits
        assert_eq!(s.get("Docker", "image_name"), Some("acme/app:latest"));
    }

    #[test]
    fn reopened_section_merges_into_the_first() {
        let (sections, _) = parse("[App]\nname = demo\n[Docker]\nimage_name = a\n[App]\ndevelopment_port = 8200\n");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].entries.len(), 2);
        assert_eq!(sections[1].entries, vec![("image_name".to_string(), "a".to_string())]);
    }

    #[test]
    fn malformed_lines_are_skipped_and_survive_the_next_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(
            &path,
            "name = orphan\n[App]\nname = demo\njunk\ndevelopment_port = 8200\n[Docker]\nimage_name = acme/app\n",
        )
        .unwrap();

        let mut s = Settings::load(&path);
        assert_eq!(s.get("App", "name"), Some("demo"));
        assert_eq!(s.get("App", "development_port"), Some("8200"));

        s.set("App", "name", "other").unwrap();

        let reloaded = Settings::load(&path);
        assert_eq!(reloaded.get("App", "name"), Some("other"));
        assert_eq!(reloaded.get("App", "development_port"), Some("8200"));
        assert_eq!(reloaded.get("Docker", "image_name"), Some("acme/app"));
    }

    #[test]
    fn parse_errors_report_lines() {
        let (sections, errors) = parse("[App]\nname = demo\njunk\n= nokey\n");
        assert_eq!(errors.iter().map(|e| e.line).collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(sections[0].entries, vec![("name".to_string(), "demo".to_string())]);

        // entries under a broken header have nowhere to go
        let (sections, errors) = parse("[App\nname = demo\n");
        assert!(sections.is_empty());
        assert_eq!(errors.iter().map(|e| e.line).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn set_trims_values_like_a_reload_does() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = store_in(&dir);
        s.set("App", "name", "  demo \t").unwrap();

        assert_eq!(s.get("App", "name"), Some("demo"));
        assert_eq!(store_in(&dir).get("App", "name"), Some("demo"));
    }

    #[test]
    fn dev_port_defaults_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = store_in(&dir);
        assert_eq!(s.dev_port().unwrap(), 8100);

        s.set("App", "development_port", "8200").unwrap();
        assert_eq!(s.dev_port().unwrap(), 8200);

        s.set("App", "development_port", "eighty").unwrap();
        assert!(matches!(s.dev_port(), Err(LauncherError::InvalidSetting { .. })));
    }
}
