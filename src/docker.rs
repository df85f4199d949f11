use crate::config::HostContext;
use crate::error::LauncherError;
use crate::process::{self, Interrupt};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Mount point of the app directory inside the container; also its working dir.
pub const CONTAINER_WORKDIR: &str = "/myApp";

/// Host identity files mounted read-only so `-u uid:gid` resolves to a named user.
pub const IDENTITY_FILES: [&str; 3] = ["/etc/passwd", "/etc/group", "/etc/shadow"];

/// Ports published 1:1 besides the development port.
pub const FIXED_PORTS: [u16; 5] = [3000, 5000, 8080, 9876, 35729];

/// Container side of the development port mapping.
pub const DEV_CONTAINER_PORT: u16 = 8100;

const IMAGE_TABLE_FORMAT: &str = "table {{.Repository}}||{{.Tag}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Block until the child exits.
    Wait,
    /// Block until the child exits, forwarding an interrupt to it.
    Stream,
}

/// A fully built command line. Never goes through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub mode: RunMode,
}

#[cfg(test)]
impl Invocation {
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Values following each occurrence of `flag`, e.g. every `-t <tag>`.
    pub fn values_of(&self, flag: &str) -> Vec<&str> {
        self.args
            .windows(2)
            .filter(|w| w[0] == flag)
            .map(|w| w[1].as_str())
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for a in &self.args {
            write!(f, " {}", shell_quote(a))?;
        }
        Ok(())
    }
}

fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+%".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub name: String,
    pub version: String,
    pub tag_latest: bool,
    pub use_cache: bool,
}

/// `docker build` of the current directory, tagged `name:version` (and `name:latest`).
pub fn build_invocation(host: &HostContext, req: &BuildRequest) -> Invocation {
    let mut args = vec![
        "build".to_string(),
        "--build-arg".to_string(),
        format!("USER_ID={}", host.uid),
        "--build-arg".to_string(),
        format!("GROUP_ID={}", host.gid),
        "-t".to_string(),
        format!("{}:{}", req.name, req.version),
    ];
    if req.tag_latest {
        args.push("-t".to_string());
        args.push(format!("{}:latest", req.name));
    }
    if !req.use_cache {
        args.push("--no-cache".to_string());
    }
    args.push(".".to_string());

    Invocation {
        program: host.docker_bin.clone(),
        args,
        mode: RunMode::Wait,
    }
}

pub fn list_images_invocation(docker_bin: &str, reference: Option<&str>) -> Invocation {
    let mut args = vec![
        "images".to_string(),
        "--format".to_string(),
        IMAGE_TABLE_FORMAT.to_string(),
    ];
    if let Some(r) = reference.map(str::trim).filter(|r| !r.is_empty()) {
        args.push(format!("--filter=reference={r}"));
    }
    Invocation {
        program: docker_bin.to_string(),
        args,
        mode: RunMode::Wait,
    }
}

/// Turn `docker images --format 'table {{.Repository}}||{{.Tag}}'` output into
/// `repository:tag` strings, keeping docker's order. The first line is the header.
pub fn parse_image_table(out: &str) -> Vec<String> {
    out.lines()
        .skip(1)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| l.split("||").map(str::trim).collect::<Vec<_>>().join(":"))
        .collect()
}

/// Argument builder for `docker run`.
#[derive(Debug, Clone)]
pub struct RunArgs {
    args: Vec<String>,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self::new()
    }
}

impl RunArgs {
    pub fn new() -> Self {
        Self {
            args: vec!["run".to_string(), "--rm".to_string()],
        }
    }

    pub fn init(mut self) -> Self {
        self.args.push("--init".to_string());
        self
    }

    pub fn env(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.args.push("-e".to_string());
        self.args.push(format!("{key}={value}"));
        self
    }

    /// The fixed 1:1 ports plus `<dev_port>:8100`.
    pub fn dev_ports(mut self, dev_port: u16) -> Self {
        for p in FIXED_PORTS.iter().take(2) {
            self = self.publish(*p, *p);
        }
        self = self.publish(dev_port, DEV_CONTAINER_PORT);
        for p in FIXED_PORTS.iter().skip(2) {
            self = self.publish(*p, *p);
        }
        self
    }

    fn publish(mut self, host: u16, container: u16) -> Self {
        self.args.push("-p".to_string());
        self.args.push(format!("{host}:{container}"));
        self
    }

    /// Mount `host_dir` at `/myApp`, add the identity mounts, and work from there.
    pub fn workspace(mut self, host_dir: &Path) -> Self {
        self.args.push("-v".to_string());
        self.args
            .push(format!("{}:{CONTAINER_WORKDIR}", host_dir.display()));
        for f in IDENTITY_FILES {
            self.args.push("-v".to_string());
            self.args.push(format!("{f}:{f}:ro"));
        }
        self.args.push("-w".to_string());
        self.args.push(CONTAINER_WORKDIR.to_string());
        self
    }

    /// `-it` as the host user.
    pub fn interactive_as(mut self, host: &HostContext) -> Self {
        self.args.push("-it".to_string());
        self.args.push("-u".to_string());
        self.args.push(host.user_spec());
        self
    }

    pub fn finish(mut self, host: &HostContext, image: &str, command: &[&str], mode: RunMode) -> Invocation {
        self.args.push(image.to_string());
        self.args.extend(command.iter().map(|s| s.to_string()));
        Invocation {
            program: host.docker_bin.clone(),
            args: self.args,
            mode,
        }
    }
}

/// The container runtime as seen by the action handlers.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Local images as `repository:tag`, optionally restricted by a reference filter.
    async fn list_images(&self, reference: Option<&str>) -> Result<Vec<String>>;

    /// Run `invocation` from the working directory; returns the exit code.
    async fn execute(&self, invocation: &Invocation) -> Result<i32>;

    /// Whether the process has been sent an interrupt.
    fn interrupted(&self) -> bool {
        false
    }
}

/// `ContainerRuntime` backed by the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    bin: String,
    cwd: PathBuf,
    interrupt: Interrupt,
}

impl DockerCli {
    pub fn new(bin: &str, cwd: &Path, interrupt: Interrupt) -> Self {
        Self {
            bin: bin.to_string(),
            cwd: cwd.to_path_buf(),
            interrupt,
        }
    }

    fn command(&self, inv: &Invocation) -> Command {
        let mut c = Command::new(&inv.program);
        c.current_dir(&self.cwd).args(&inv.args);
        c
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn list_images(&self, reference: Option<&str>) -> Result<Vec<String>> {
        let inv = list_images_invocation(&self.bin, reference);
        tracing::debug!("listing images: {inv}");

        let out = self
            .command(&inv)
            .stdin(Stdio::null())
            .output()
            .await?;
        if !out.status.success() {
            tracing::warn!("{}", String::from_utf8_lossy(&out.stderr).trim_end());
            return Err(LauncherError::CommandFailed {
                command: inv.to_string(),
                code: out.status.code(),
            }
            .into());
        }

        let images = parse_image_table(&String::from_utf8_lossy(&out.stdout));
        tracing::debug!("found {} image(s)", images.len());
        Ok(images)
    }

    async fn execute(&self, invocation: &Invocation) -> Result<i32> {
        tracing::debug!("executing ({:?}): {:?}", invocation.mode, invocation.args);
        let cmd = self.command(invocation);
        let status = match invocation.mode {
            RunMode::Wait => process::run_wait(cmd).await?,
            RunMode::Stream => process::run_stream(cmd, &self.interrupt).await?,
        };
        Ok(status.code().unwrap_or(if status.success() { 0 } else { 1 }))
    }

    fn interrupted(&self) -> bool {
        self.interrupt.is_fired()
    }
}
