use crate::config::HostContext;
use crate::docker::{self, BuildRequest, ContainerRuntime, Invocation, RunArgs, RunMode};
use crate::error::LauncherError;
use crate::settings::{Settings, APP_NAME_KEY, APP_SECTION, DOCKER_SECTION, IMAGE_NAME_KEY};
use crate::ui::{Prompter, Question};
use anyhow::{Context, Result};
use crossterm::style::Stylize;
use std::fs;
use std::path::Path;

pub const DEFAULT_IMAGE_NAME: &str = "t08094a/ionic";
pub const DEFAULT_IMAGE_VERSION: &str = "1.0.0";

/// Script run inside the container by the runner action.
pub const RUNNER_SCRIPT: &str = "runner.py";

const IMAGE_QUESTION: &str = "Which image should be used?";

/// Everything an action needs: host facts, persisted settings, the runtime and the prompter.
pub struct Session<R, P> {
    pub host: HostContext,
    pub settings: Settings,
    pub runtime: R,
    pub prompter: P,
}

impl<R: ContainerRuntime, P: Prompter> Session<R, P> {
    pub fn new(host: HostContext, settings: Settings, runtime: R, prompter: P) -> Self {
        Self {
            host,
            settings,
            runtime,
            prompter,
        }
    }

    pub async fn build_image(&mut self) -> Result<()> {
        let answers = self.prompter.ask(&[
            Question::text("name", "Which name should the build get?").with_default(DEFAULT_IMAGE_NAME),
            Question::text("version", "Which version should the build get?")
                .with_default(DEFAULT_IMAGE_VERSION),
            Question::confirm("latest", "Also tag as 'latest'?", true),
            Question::confirm("with_cache", "Build with docker's cache?", true),
        ])?;

        let req = BuildRequest {
            name: answers.text("name")?.to_string(),
            version: answers.text("version")?.to_string(),
            tag_latest: answers.flag("latest")?,
            use_cache: answers.flag("with_cache")?,
        };

        self.settings.set(DOCKER_SECTION, IMAGE_NAME_KEY, &req.name)?;

        let inv = docker::build_invocation(&self.host, &req);
        self.launch(&inv).await?;
        Ok(())
    }

    pub async fn create_app(&mut self) -> Result<()> {
        let images = self.available_images().await?;

        let mut questions = vec![Question::text("app_name", "Which name should the app get?").required()];
        if images.len() > 1 {
            questions.push(image_question(&images));
        }
        let answers = self.prompter.ask(&questions)?;

        let app_name = validate_app_name(answers.text("app_name")?)?;
        let image = match answers.get("image") {
            Some(_) => answers.choice("image")?.to_string(),
            None => images[0].clone(),
        };

        self.settings.set(APP_SECTION, APP_NAME_KEY, &app_name)?;

        let app_dir = self.host.cwd.join(&app_name);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("creating {}", app_dir.display()))?;

        let inv = RunArgs::new()
            .workspace(&app_dir)
            .interactive_as(&self.host)
            .finish(
                &self.host,
                &image,
                &["ionic", "start", &app_name, "--no-git"],
                RunMode::Wait,
            );
        self.launch(&inv).await?;

        hoist_scaffold(&app_dir, &app_name)
    }

    pub async fn serve(&mut self) -> Result<()> {
        let app_name = self.saved_app_name()?;
        let port = self.settings.dev_port()?;
        let image = self.choose_image().await?;

        let port_arg = port.to_string();
        let inv = RunArgs::new()
            .init()
            .env("CHOKIDAR_USEPOLLING", 1)
            .env("IONIC_PORT", port)
            .dev_ports(port)
            .workspace(&self.host.cwd.join(&app_name))
            .interactive_as(&self.host)
            .finish(
                &self.host,
                &image,
                &["ionic", "serve", "--all", "-b", "--address", "0.0.0.0", "--port", &port_arg],
                RunMode::Stream,
            );
        self.launch(&inv).await?;
        Ok(())
    }

    pub async fn run_internal_script(&mut self) -> Result<()> {
        let app_name = self.saved_app_name()?;
        let port = self.settings.dev_port()?;
        let image = self.choose_image().await?;

        let inv = RunArgs::new()
            .init()
            .env("CHOKIDAR_USEPOLLING", 1)
            .dev_ports(port)
            .workspace(&self.host.cwd.join(&app_name))
            .interactive_as(&self.host)
            .finish(&self.host, &image, &[RUNNER_SCRIPT], RunMode::Stream);
        self.launch(&inv).await?;
        Ok(())
    }

    pub async fn start_bash(&mut self) -> Result<()> {
        let image = self.choose_image().await?;
        let port = self.settings.dev_port()?;

        let inv = RunArgs::new()
            .env("CHOKIDAR_USEPOLLING", 1)
            .env("IONIC_PORT", port)
            .dev_ports(port)
            .workspace(&self.host.cwd)
            .interactive_as(&self.host)
            .finish(&self.host, &image, &["bash"], RunMode::Wait);
        self.launch(&inv).await?;
        Ok(())
    }

    /// `[App] name`; an empty value counts as missing.
    fn saved_app_name(&self) -> Result<String, LauncherError> {
        let name = self.settings.require(APP_SECTION, APP_NAME_KEY)?.trim();
        if name.is_empty() {
            return Err(LauncherError::MissingSetting {
                section: APP_SECTION.to_string(),
                key: APP_NAME_KEY.to_string(),
            });
        }
        Ok(name.to_string())
    }

    /// Images matching the saved image name; an empty list is an error.
    async fn available_images(&self) -> Result<Vec<String>> {
        let filter = self.settings.get(DOCKER_SECTION, IMAGE_NAME_KEY);
        let images = self.runtime.list_images(filter).await?;
        if images.is_empty() {
            return Err(LauncherError::NoImages {
                filter: filter.map(str::to_string),
            }
            .into());
        }
        Ok(images)
    }

    async fn choose_image(&mut self) -> Result<String> {
        let mut images = self.available_images().await?;
        if images.len() == 1 {
            return Ok(images.remove(0));
        }
        let answers = self.prompter.ask(&[image_question(&images)])?;
        Ok(answers.choice("image")?.to_string())
    }

    async fn launch(&self, inv: &Invocation) -> Result<i32> {
        println!("{}", format!("call: {inv}").cyan());
        let code = self.runtime.execute(inv).await?;
        if code != 0 {
            tracing::warn!("{} {} exited with code {code}", inv.program, inv.args[0]);
        }
        Ok(code)
    }
}

/// The name becomes both a host directory and an `ionic start` argument, so it
/// must be a single plain path component.
fn validate_app_name(raw: &str) -> Result<String, LauncherError> {
    let name = raw.trim();
    let plain = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if name.is_empty() || !plain || name.starts_with('.') || name.starts_with('-') {
        return Err(LauncherError::InvalidAppName {
            name: raw.to_string(),
        });
    }
    Ok(name.to_string())
}

fn image_question(images: &[String]) -> Question {
    Question::list("image", IMAGE_QUESTION, images.to_vec(), 0)
}

/// `ionic start` inside `/myApp` creates `/myApp/<app>`; pull its contents up
/// into the mounted directory and drop the nested one.
fn hoist_scaffold(app_dir: &Path, app_name: &str) -> Result<()> {
    let nested = app_dir.join(app_name);
    if !nested.is_dir() {
        tracing::warn!("scaffold produced no {}, nothing to move", nested.display());
        return Ok(());
    }

    for entry in fs::read_dir(&nested)? {
        let entry = entry?;
        let dest = app_dir.join(entry.file_name());
        fs::rename(entry.path(), &dest)
            .with_context(|| format!("moving {} to {}", entry.path().display(), dest.display()))?;
    }
    fs::remove_dir(&nested).with_context(|| format!("removing {}", nested.display()))?;
    Ok(())
}
