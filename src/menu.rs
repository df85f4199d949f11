use crate::actions::Session;
use crate::docker::ContainerRuntime;
use crate::error::LauncherError;
use crate::ui::{Prompter, Question};
use anyhow::{anyhow, Result};
use crossterm::style::Stylize;

const SELECTION: &str = "selection";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    BuildImage,
    CreateApp,
    Serve,
    InternalRunner,
    StartBash,
    Cancel,
}

impl Action {
    /// Menu order.
    pub const ALL: [Action; 6] = [
        Action::BuildImage,
        Action::CreateApp,
        Action::Serve,
        Action::InternalRunner,
        Action::StartBash,
        Action::Cancel,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Action::BuildImage => "Build Docker image",
            Action::CreateApp => "Create app template",
            Action::Serve => "Debug with ionic serve",
            Action::InternalRunner => "Start runner script in Docker",
            Action::StartBash => "Start bash in Docker",
            Action::Cancel => "Cancel",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.label() == label)
    }
}

/// Ask for one action and run it. Cancelling the menu, or an interrupt that
/// arrived while it was shown, is a clean exit.
pub async fn run<R: ContainerRuntime, P: Prompter>(session: &mut Session<R, P>) -> Result<()> {
    let question = Question::list(
        SELECTION,
        "Which action should be run?",
        Action::ALL.iter().map(|a| a.label().to_string()).collect(),
        0,
    );

    let answers = match session.prompter.ask(&[question]) {
        Ok(a) => a,
        Err(e) if is_cancelled(&e) => return Ok(()),
        Err(e) => return Err(e),
    };
    if session.runtime.interrupted() {
        tracing::debug!("interrupted while the menu was open");
        return Ok(());
    }
    let label = answers.choice(SELECTION)?;
    let action = Action::from_label(label).ok_or_else(|| anyhow!("unknown action: {label}"))?;

    dispatch(session, action).await
}

/// Run `action`, reporting user-facing failures instead of returning them.
pub async fn dispatch<R: ContainerRuntime, P: Prompter>(
    session: &mut Session<R, P>,
    action: Action,
) -> Result<()> {
    if action == Action::Cancel {
        return Ok(());
    }
    println!("{}", action.label().bold());
    tracing::debug!("running action {action:?}");

    let res = match action {
        Action::BuildImage => session.build_image().await,
        Action::CreateApp => session.create_app().await,
        Action::Serve => session.serve().await,
        Action::InternalRunner => session.run_internal_script().await,
        Action::StartBash => session.start_bash().await,
        Action::Cancel => Ok(()),
    };

    match res {
        Err(e) if is_cancelled(&e) => Ok(()),
        Err(e) => match e.downcast_ref::<LauncherError>() {
            Some(le) if le.is_user_facing() => {
                eprintln!("{}", le.to_string().red());
                Ok(())
            }
            _ => Err(e),
        },
        ok => ok,
    }
}

fn is_cancelled(e: &anyhow::Error) -> bool {
    matches!(e.downcast_ref::<LauncherError>(), Some(LauncherError::Cancelled))
}
