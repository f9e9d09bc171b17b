//! Shell transport: container sessions through the local ssh client

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::AdmError;
use crate::hosts::SshConfig;
use crate::session::terminal::termination_signal;
use crate::session::{
    validate_container_id, CloseReason, ExecOutput, RemoteExecutor, RemoteSession, SessionEvent,
    SessionExit, SessionFsm, SessionState,
};
use crate::storage::settings::Settings;

/// ssh reports its own failures (unreachable host, auth) with 255
const SSH_FAILURE: i32 = 255;

/// Engine status of `exec`: daemon error, command not executable, not found
const ENGINE_FAILURES: [i32; 3] = [125, 126, 127];

const INSPECT_FORMAT: &str = "'{{.State.Status}}'";

/// Where and how the ssh client is run for one host
#[derive(Debug, Clone)]
pub struct ShellTarget {
    pub ssh: SshConfig,
    /// Local ssh client binary
    pub binary: PathBuf,
    /// Container engine on the host
    pub engine: String,
    /// Privilege prefix, empty for none
    pub sudo: String,
    pub connect_timeout: Duration,
    pub strict_host_key_checking: bool,
}

impl ShellTarget {
    pub fn new(ssh: SshConfig, settings: &Settings) -> Self {
        Self {
            ssh,
            binary: PathBuf::from(&settings.ssh.binary),
            engine: settings.engine.clone(),
            sudo: settings.sudo_alias.clone(),
            connect_timeout: Duration::from_secs(settings.ssh.connect_timeout_secs),
            strict_host_key_checking: settings.ssh.strict_host_key_checking,
        }
    }

    /// Client options and target, without the remote command
    pub fn ssh_args(&self, tty: bool) -> Vec<String> {
        let mut args = Vec::new();
        if tty {
            args.push("-tt".to_string());
        }

        args.push("-p".to_string());
        args.push(self.ssh.port.to_string());

        if let Some(key) = &self.ssh.private_key_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        if self.ssh.forward_agent {
            args.push("-A".to_string());
        }

        args.push("-o".to_string());
        args.push(format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)));
        args.push("-o".to_string());
        if self.strict_host_key_checking {
            args.push("StrictHostKeyChecking=yes".to_string());
        } else {
            args.push("StrictHostKeyChecking=no".to_string());
            args.push("-o".to_string());
            args.push("UserKnownHostsFile=/dev/null".to_string());
        }
        args.push("-o".to_string());
        args.push("LogLevel=ERROR".to_string());

        args.push(self.ssh.target());
        args
    }

    /// `[sudo [-u user]] engine`
    pub fn engine_prefix(&self) -> String {
        if self.sudo.is_empty() {
            return self.engine.clone();
        }
        match &self.ssh.become_user {
            Some(user) => format!("{} -u {} {}", self.sudo, user, self.engine),
            None => format!("{} {}", self.sudo, self.engine),
        }
    }

    /// Remote command line of an interactive attach
    pub fn attach_command(&self, container_id: &str, workdir: &str) -> String {
        let script = format!("cd {}; /bin/bash", shell_quote(workdir));
        format!(
            "{} exec -it {} /bin/bash -c {}",
            self.engine_prefix(),
            container_id,
            shell_quote(&script)
        )
    }

    /// Remote command line of a non-interactive exec
    pub fn exec_command(&self, container_id: &str, command: &[String]) -> String {
        let mut line = format!("{} exec {}", self.engine_prefix(), container_id);
        for word in command {
            line.push(' ');
            line.push_str(&shell_quote(word));
        }
        line
    }

    pub fn inspect_command(&self, container_id: &str) -> String {
        format!(
            "{} inspect --format {} {}",
            self.engine_prefix(),
            INSPECT_FORMAT,
            container_id
        )
    }

    fn command(&self, tty: bool, remote: String) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.ssh_args(tty)).arg(remote).kill_on_drop(true);
        cmd
    }

    async fn output(&self, remote: String) -> Result<ExecOutput, AdmError> {
        debug!("Running on {}: {}", self.ssh.target(), remote);
        let output = self
            .command(false, remote)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| AdmError::connection_failed(self.ssh.target(), e))?;

        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code == SSH_FAILURE {
            return Err(AdmError::connection_failed(
                self.ssh.target(),
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }

        Ok(ExecOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl RemoteExecutor for ShellTarget {
    async fn exec(&self, container_id: &str, command: &[String]) -> Result<ExecOutput, AdmError> {
        validate_container_id(container_id)?;
        self.output(self.exec_command(container_id, command)).await
    }

    async fn inspect(&self, container_id: &str) -> Result<String, AdmError> {
        validate_container_id(container_id)?;
        let output = self.output(self.inspect_command(container_id)).await?;
        if output.exit_code != 0 {
            return Err(AdmError::SessionError(format!(
                "inspect of {} failed: {}",
                container_id,
                output.stderr.trim()
            )));
        }
        Ok(output.stdout.trim().to_string())
    }
}

/// Interactive session over ssh.
///
/// The client owns the local terminal: stdio is inherited, so raw mode and
/// window size changes are handled by ssh itself.
pub struct ShellSession {
    target: ShellTarget,
    fsm: SessionFsm,
}

impl ShellSession {
    pub fn new(target: ShellTarget) -> Self {
        Self {
            target,
            fsm: SessionFsm::new(),
        }
    }

    pub fn target(&self) -> &ShellTarget {
        &self.target
    }

    fn finish(&mut self, status: ExitStatus) -> Result<SessionExit, AdmError> {
        let target = self.target.ssh.target();
        match status.code() {
            Some(SSH_FAILURE) => {
                let reason = "ssh exited with status 255";
                self.fsm.process(SessionEvent::Fail(reason.to_string()))?;
                Err(AdmError::connection_failed(target, reason))
            }
            Some(code) if ENGINE_FAILURES.contains(&code) => {
                let reason = format!("container exec failed with status {}", code);
                self.fsm.process(SessionEvent::Fail(reason.clone()))?;
                Err(AdmError::SessionError(reason))
            }
            Some(code) => {
                self.fsm.process(SessionEvent::Close(CloseReason::RemoteExit))?;
                Ok(SessionExit {
                    code: Some(code),
                    reason: CloseReason::RemoteExit,
                })
            }
            None => {
                self.fsm.process(SessionEvent::Close(CloseReason::RemoteEof))?;
                Ok(SessionExit {
                    code: None,
                    reason: CloseReason::RemoteEof,
                })
            }
        }
    }
}

#[async_trait]
impl RemoteSession for ShellSession {
    fn state(&self) -> SessionState {
        self.fsm.state()
    }

    async fn attach(&mut self, container_id: &str, workdir: &str) -> Result<SessionExit, AdmError> {
        self.fsm.process(SessionEvent::Connect)?;
        if let Err(e) = validate_container_id(container_id) {
            self.fsm.process(SessionEvent::ConnectFailed(e.to_string()))?;
            return Err(e);
        }

        let remote = self.target.attach_command(container_id, workdir);
        info!("Attaching to {} on {}", container_id, self.target.ssh.target());
        debug!("Remote command: {}", remote);

        let mut child = match self
            .target
            .command(true, remote)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                self.fsm.process(SessionEvent::ConnectFailed(e.to_string()))?;
                return Err(AdmError::connection_failed(self.target.ssh.target(), e));
            }
        };
        self.fsm.process(SessionEvent::Connected)?;

        tokio::select! {
            status = child.wait() => match status {
                Ok(status) => self.finish(status),
                Err(e) => {
                    self.fsm.process(SessionEvent::Fail(e.to_string()))?;
                    Err(AdmError::SessionError(format!("waiting for ssh failed: {}", e)))
                }
            },
            signal = termination_signal() => {
                info!("{} received, closing session to {}", signal, container_id);
                if let Err(e) = child.kill().await {
                    warn!("Failed to stop ssh client: {}", e);
                }
                self.fsm.process(SessionEvent::Close(CloseReason::Interrupted))?;
                Ok(SessionExit { code: None, reason: CloseReason::Interrupted })
            }
        }
    }
}

/// Quote one word for a POSIX shell
fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./=:,@%+".contains(&b));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}
