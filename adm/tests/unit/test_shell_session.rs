//! Shell transport tests
//!
//! The ssh client is replaced by local binaries so no remote host is needed.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use stratadm::errors::AdmError;
use stratadm::hosts::SshConfig;
use stratadm::session::shell::{ShellSession, ShellTarget};
use stratadm::session::{CloseReason, RemoteExecutor, RemoteSession, SessionState};

const CONTAINER: &str = "3f4a9c1b22de";

fn create_test_target(binary: impl Into<PathBuf>) -> ShellTarget {
    ShellTarget {
        ssh: SshConfig {
            user: "ops".to_string(),
            hostname: "10.0.0.1".to_string(),
            port: 22,
            private_key_file: None,
            forward_agent: false,
            become_user: None,
        },
        binary: binary.into(),
        engine: "docker".to_string(),
        sudo: "sudo".to_string(),
        connect_timeout: Duration::from_secs(10),
        strict_host_key_checking: false,
    }
}

/// Executable shell script standing in for the ssh client
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn test_ssh_args() {
    let mut target = create_test_target("ssh");
    target.ssh.port = 2222;
    target.ssh.private_key_file = Some(PathBuf::from("/home/ops/.ssh/id_ed25519"));

    let args = target.ssh_args(true);
    assert_eq!(args.first().map(String::as_str), Some("-tt"));
    assert_eq!(args.last().map(String::as_str), Some("ops@10.0.0.1"));

    let joined = args.join(" ");
    assert!(joined.contains("-p 2222"));
    assert!(joined.contains("-i /home/ops/.ssh/id_ed25519"));
    assert!(joined.contains("-o ConnectTimeout=10"));
    assert!(joined.contains("-o StrictHostKeyChecking=no"));
    assert!(!joined.contains("-A"));

    target.ssh.forward_agent = true;
    target.strict_host_key_checking = true;
    let args = target.ssh_args(false);
    assert!(!args.contains(&"-tt".to_string()));
    assert!(args.contains(&"-A".to_string()));
    assert!(args.contains(&"StrictHostKeyChecking=yes".to_string()));
    assert!(!args.contains(&"UserKnownHostsFile=/dev/null".to_string()));
}

#[test]
fn test_attach_command() {
    let mut target = create_test_target("ssh");
    assert_eq!(
        target.attach_command(CONTAINER, "/stratabs/mds"),
        "sudo docker exec -it 3f4a9c1b22de /bin/bash -c 'cd /stratabs/mds; /bin/bash'"
    );

    // Workdir reaches the container shell as one quoted word
    assert_eq!(
        target.attach_command(CONTAINER, "/opt/x;touch${IFS}/tmp/pwned;#"),
        "sudo docker exec -it 3f4a9c1b22de /bin/bash -c \
         'cd '\\''/opt/x;touch${IFS}/tmp/pwned;#'\\''; /bin/bash'"
    );

    target.ssh.become_user = Some("strata".to_string());
    assert!(target
        .attach_command(CONTAINER, "/stratabs/mds")
        .starts_with("sudo -u strata docker exec -it"));

    target.sudo = String::new();
    target.engine = "podman".to_string();
    assert!(target
        .attach_command(CONTAINER, "/stratabs/mds")
        .starts_with("podman exec -it 3f4a9c1b22de"));
}

#[tokio::test]
async fn test_attach_reports_remote_exit() {
    let mut session = ShellSession::new(create_test_target("true"));
    assert_eq!(session.state(), SessionState::Idle);

    let exit = session.attach(CONTAINER, "/stratabs/mds").await.unwrap();
    assert_eq!(exit.code, Some(0));
    assert_eq!(exit.reason, CloseReason::RemoteExit);
    assert_eq!(session.state(), SessionState::Closed);

    let mut session = ShellSession::new(create_test_target("false"));
    let exit = session.attach(CONTAINER, "/stratabs/mds").await.unwrap();
    assert_eq!(exit.code, Some(1));
    assert_eq!(exit.exit_status(), 1);
}

#[tokio::test]
async fn test_session_is_single_use() {
    let mut session = ShellSession::new(create_test_target("true"));
    session.attach(CONTAINER, "/stratabs/mds").await.unwrap();

    let second = session.attach(CONTAINER, "/stratabs/mds").await;
    assert!(matches!(second, Err(AdmError::SessionError(_))));
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_missing_client_is_connection_failure() {
    let mut session = ShellSession::new(create_test_target("/nonexistent/ssh"));

    let result = session.attach(CONTAINER, "/stratabs/mds").await;
    match result {
        Err(AdmError::ConnectionFailed { target, .. }) => assert_eq!(target, "ops@10.0.0.1"),
        other => panic!("expected ConnectionFailed, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_invalid_container_id_never_spawns() {
    let mut session = ShellSession::new(create_test_target("/nonexistent/ssh"));
    let result = session.attach("abc; reboot", "/stratabs/mds").await;
    assert!(matches!(result, Err(AdmError::SessionError(_))));
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_exit_status_mapping() {
    let dir = tempfile::tempdir().unwrap();

    let unreachable = write_script(dir.path(), "ssh-unreachable", "exit 255");
    let mut session = ShellSession::new(create_test_target(&unreachable));
    assert!(matches!(
        session.attach(CONTAINER, "/stratabs/mds").await,
        Err(AdmError::ConnectionFailed { .. })
    ));

    let no_bash = write_script(dir.path(), "ssh-no-bash", "exit 127");
    let mut session = ShellSession::new(create_test_target(&no_bash));
    assert!(matches!(
        session.attach(CONTAINER, "/stratabs/mds").await,
        Err(AdmError::SessionError(_))
    ));
    assert_eq!(session.state(), SessionState::Closed);

    let remote_failure = write_script(dir.path(), "ssh-exit-3", "exit 3");
    let mut session = ShellSession::new(create_test_target(&remote_failure));
    let exit = session.attach(CONTAINER, "/stratabs/mds").await.unwrap();
    assert_eq!(exit.code, Some(3));
}

#[tokio::test]
async fn test_exec_quotes_arguments() {
    let target = create_test_target("echo");
    let command = vec!["ls".to_string(), "-la".to_string(), "/var/log/my dir".to_string()];

    let output = target.exec(CONTAINER, &command).await.unwrap();
    assert_eq!(output.exit_code, 0);

    let line = output.stdout.trim();
    assert!(line.starts_with("-p 22"));
    assert!(line.ends_with("ops@10.0.0.1 sudo docker exec 3f4a9c1b22de ls -la '/var/log/my dir'"));
    assert!(!line.contains("-tt"));
}

#[tokio::test]
async fn test_inspect() {
    let dir = tempfile::tempdir().unwrap();

    let running = write_script(dir.path(), "ssh-running", "echo running");
    let target = create_test_target(&running);
    assert_eq!(target.inspect(CONTAINER).await.unwrap(), "running");

    let missing = write_script(dir.path(), "ssh-missing", "echo 'no such container' >&2; exit 1");
    let target = create_test_target(&missing);
    assert!(matches!(
        target.inspect(CONTAINER).await,
        Err(AdmError::SessionError(_))
    ));

    let unreachable = write_script(dir.path(), "ssh-unreachable", "exit 255");
    let target = create_test_target(&unreachable);
    let err = target.exec(CONTAINER, &["true".to_string()]).await.unwrap_err();
    assert!(matches!(err, AdmError::ConnectionFailed { .. }));
}
