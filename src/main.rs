mod actions;
mod config;
mod docker;
mod env;
mod error;
mod menu;
mod process;
mod settings;
mod ui;

#[cfg(test)]
mod testing;

use anyhow::Result;
use error::LauncherError;

#[tokio::main]
async fn main() -> Result<()> {
    let cwd = std::env::current_dir()?;

    let dotenv = env::load_env(&cwd)?;
    env::init_logging();
    if dotenv {
        tracing::debug!("loaded .env from {}", cwd.display());
    }

    let host = config::HostContext::detect(cwd);
    let settings = settings::Settings::load(config::resolve_settings_path(&host.cwd));
    tracing::debug!(
        "uid={} gid={} docker={} settings={}",
        host.uid,
        host.gid,
        host.docker_bin,
        settings.path().display()
    );

    let runtime = docker::DockerCli::new(&host.docker_bin, &host.cwd, process::Interrupt::listen());
    let mut session = actions::Session::new(host, settings, runtime, ui::TerminalPrompter);

    match menu::run(&mut session).await {
        Err(e) if matches!(e.downcast_ref::<LauncherError>(), Some(LauncherError::Interrupted)) => {
            std::process::exit(130)
        }
        res => res,
    }
}
