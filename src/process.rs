use crate::error::LauncherError;
use anyhow::Result;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::watch;

/// Cancellation token handed to streaming invocations.
///
/// Counts interrupts rather than flipping a flag: the first one is forwarded
/// to the child, a later one kills it.
#[derive(Debug, Clone)]
pub struct Interrupt {
    tx: Arc<watch::Sender<u64>>,
    rx: watch::Receiver<u64>,
}

impl Interrupt {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(0);
        Self { tx: Arc::new(tx), rx }
    }

    /// Token counting every Ctrl-C delivered to this process.
    pub fn listen() -> Self {
        let interrupt = Self::new();
        let armed = interrupt.clone();
        tokio::spawn(async move {
            loop {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::debug!("received Ctrl+C");
                        armed.trigger();
                    }
                    Err(e) => {
                        tracing::error!("failed to listen for Ctrl+C signal: {e}");
                        break;
                    }
                }
            }
        });
        interrupt
    }

    pub fn trigger(&self) {
        self.tx.send_modify(|n| *n += 1);
    }

    pub fn count(&self) -> u64 {
        *self.rx.borrow()
    }

    pub fn is_fired(&self) -> bool {
        self.count() > 0
    }

    pub async fn fired(&self) {
        self.fired_after(0).await
    }

    /// Resolves once more than `seen` interrupts have arrived.
    pub async fn fired_after(&self, seen: u64) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|n| *n > seen).await;
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

fn attach_terminal(cmd: &mut Command) {
    cmd.stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
}

/// Run to completion with the terminal attached. The exit status is returned, not checked.
pub async fn run_wait(mut cmd: Command) -> Result<ExitStatus> {
    attach_terminal(&mut cmd);
    let status = cmd.status().await?;
    Ok(status)
}

/// Run with the terminal attached until the child exits or `interrupt` fires.
///
/// On interrupt the child gets SIGINT and is awaited; another interrupt while
/// waiting kills it. Either way `LauncherError::Interrupted` is returned.
/// `kill_on_drop` covers every other early exit.
pub async fn run_stream(mut cmd: Command, interrupt: &Interrupt) -> Result<ExitStatus> {
    if interrupt.is_fired() {
        return Err(LauncherError::Interrupted.into());
    }
    attach_terminal(&mut cmd);
    cmd.kill_on_drop(true);
    let mut child = cmd.spawn()?;

    tokio::select! {
        status = child.wait() => Ok(status?),
        _ = interrupt.fired() => {
            eprintln!("SIGINT received");
            let seen = interrupt.count();
            forward_interrupt(&mut child);
            tokio::select! {
                status = child.wait() => {
                    tracing::debug!("child exited after interrupt: {}", status?);
                }
                _ = interrupt.fired_after(seen) => {
                    tracing::warn!("interrupted again, killing child");
                    child.kill().await?;
                }
            }
            Err(LauncherError::Interrupted.into())
        }
    }
}

#[cfg(unix)]
fn forward_interrupt(child: &mut Child) {
    if let Some(pid) = child.id() {
        if let Err(e) = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid as i32),
            nix::sys::signal::Signal::SIGINT,
        ) {
            tracing::warn!("failed to forward SIGINT to pid {pid}: {e}");
        }
    }
}

#[cfg(not(unix))]
fn forward_interrupt(child: &mut Child) {
    // No SIGINT equivalent for an arbitrary child; terminate it instead.
    let _ = child.start_kill();
}
