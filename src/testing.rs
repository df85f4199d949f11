//! Test doubles for the container runtime and the prompter.

use crate::actions::Session;
use crate::config::HostContext;
use crate::docker::{ContainerRuntime, Invocation};
use crate::error::LauncherError;
use crate::settings::{Settings, SETTINGS_FILE_NAME};
use crate::ui::{Answer, Answers, Prompter, Question, QuestionKind};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

type Hook = Box<dyn Fn(&Invocation) + Send + Sync>;

/// Records every call; `images` is what `docker images` would print and
/// `exit_code` what every executed command returns.
#[derive(Default)]
pub struct FakeRuntime {
    pub images: Vec<String>,
    pub fail_listing: bool,
    pub exit_code: i32,
    pub interrupted: bool,
    pub listings: Mutex<Vec<Option<String>>>,
    pub executed: Mutex<Vec<Invocation>>,
    pub on_execute: Option<Hook>,
}

impl FakeRuntime {
    pub fn with_images(images: &[&str]) -> Self {
        Self {
            images: images.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn on_execute(mut self, hook: impl Fn(&Invocation) + Send + Sync + 'static) -> Self {
        self.on_execute = Some(Box::new(hook));
        self
    }

    pub fn executed(&self) -> Vec<Invocation> {
        self.executed.lock().unwrap().clone()
    }

    pub fn listings(&self) -> Vec<Option<String>> {
        self.listings.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_images(&self, reference: Option<&str>) -> Result<Vec<String>> {
        self.listings.lock().unwrap().push(reference.map(str::to_string));
        if self.fail_listing {
            return Err(LauncherError::CommandFailed {
                command: "docker images".to_string(),
                code: Some(1),
            }
            .into());
        }
        Ok(self.images.clone())
    }

    async fn execute(&self, invocation: &Invocation) -> Result<i32> {
        self.executed.lock().unwrap().push(invocation.clone());
        if let Some(hook) = &self.on_execute {
            hook(invocation);
        }
        Ok(self.exit_code)
    }

    fn interrupted(&self) -> bool {
        self.interrupted
    }
}

/// Answers questions from a script keyed by question id; anything not
/// scripted gets the question's default, as if Enter was pressed.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    script: HashMap<&'static str, Answer>,
    pub asked: Vec<Question>,
    pub cancel: bool,
}

impl ScriptedPrompter {
    pub fn answer(mut self, id: &'static str, answer: Answer) -> Self {
        self.script.insert(id, answer);
        self
    }

    pub fn cancelling() -> Self {
        Self {
            cancel: true,
            ..Self::default()
        }
    }

    pub fn asked_ids(&self) -> Vec<&'static str> {
        self.asked.iter().map(|q| q.id).collect()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, questions: &[Question]) -> Result<Answers> {
        if self.cancel {
            return Err(LauncherError::Cancelled.into());
        }
        let mut out = Answers::default();
        for q in questions {
            self.asked.push(q.clone());
            let answer = match self.script.get(q.id) {
                Some(a) => a.clone(),
                None => default_answer(q)?,
            };
            out.insert(q.id, answer);
        }
        Ok(out)
    }
}

fn default_answer(q: &Question) -> Result<Answer> {
    Ok(match &q.kind {
        QuestionKind::Text { default, required } => {
            let value = default.clone().unwrap_or_default();
            if *required && value.is_empty() {
                bail!("no scripted answer for required question '{}'", q.id);
            }
            Answer::Text(value)
        }
        QuestionKind::Confirm { default } => Answer::Flag(*default),
        QuestionKind::List { choices, default } => Answer::Choice(choices[*default].clone()),
    })
}

pub fn text(s: &str) -> Answer {
    Answer::Text(s.to_string())
}

pub fn session_in(
    dir: &tempfile::TempDir,
    runtime: FakeRuntime,
    prompter: ScriptedPrompter,
) -> Session<FakeRuntime, ScriptedPrompter> {
    let host = HostContext {
        cwd: dir.path().to_path_buf(),
        uid: 1000,
        gid: 1000,
        docker_bin: "docker".to_string(),
    };
    let settings = Settings::load(dir.path().join(SETTINGS_FILE_NAME));
    Session::new(host, settings, runtime, prompter)
}
