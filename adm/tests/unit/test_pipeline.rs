//! End-to-end resolution tests with a mocked transport

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use stratadm::app::enter::{enter, resolve};
use stratadm::app::status::status;
use stratadm::app::AppContext;
use stratadm::errors::AdmError;
use stratadm::hosts::{HostConfig, HostRegistry, HostsDeclaration};
use stratadm::session::{
    CloseReason, ExecOutput, RemoteExecutor, RemoteSession, SessionExit, SessionFactory,
    SessionState, TransportFactory,
};
use stratadm::storage::settings::Settings;
use stratadm::storage::state::MemoryStateStore;
use stratadm::topology::{FilterOption, Match, ServiceIdentity, TopologyDeclaration};

const CLUSTER: &str = "prod";

fn create_test_hosts() -> HostsDeclaration {
    serde_json::from_value(json!({
        "hosts": [
            { "host": "h1", "hostname": "10.0.0.1", "user": "ops" },
            { "host": "h2", "hostname": "10.0.0.2", "user": "ops" },
            { "host": "h3", "hostname": "10.0.0.3", "protocol": "telnet" }
        ]
    }))
    .unwrap()
}

fn create_test_topology() -> TopologyDeclaration {
    serde_json::from_value(json!({
        "cluster": CLUSTER,
        "kind": "bs",
        "services": [
            { "role": "etcd", "deploy": [{ "host": "h1" }, { "host": "h2" }] },
            { "role": "mds", "deploy": [{ "host": "h1" }, { "host": "h2" }, { "host": "h3" }] },
            { "role": "chunkserver", "deploy": [{ "host": "h1", "instances": 2 }] }
        ]
    }))
    .unwrap()
}

fn create_test_context(settings: Settings) -> (AppContext, Arc<MemoryStateStore>) {
    let store = Arc::new(MemoryStateStore::new());
    let ctx = AppContext::new(
        settings,
        &create_test_hosts(),
        &create_test_topology(),
        store.clone(),
    )
    .unwrap();
    (ctx, store)
}

/// Record a container for the service named `name`
fn deploy(ctx: &AppContext, store: &MemoryStateStore, name: &str, container_id: &str) {
    let dc = ctx.services.iter().find(|dc| dc.name() == name).unwrap();
    store.insert(ServiceIdentity::of(CLUSTER, dc).as_str(), container_id);
}

/// Attach calls seen by the mock sessions: (host, container, workdir)
type AttachLog = Arc<Mutex<Vec<(String, String, String)>>>;

#[derive(Default)]
struct MockFactory {
    sessions: AtomicUsize,
    attaches: AttachLog,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

struct MockSession {
    host: String,
    state: SessionState,
    attaches: AttachLog,
}

#[async_trait]
impl RemoteSession for MockSession {
    fn state(&self) -> SessionState {
        self.state
    }

    async fn attach(&mut self, container_id: &str, workdir: &str) -> Result<SessionExit, AdmError> {
        self.attaches.lock().unwrap().push((
            self.host.clone(),
            container_id.to_string(),
            workdir.to_string(),
        ));
        self.state = SessionState::Closed;
        Ok(SessionExit {
            code: Some(0),
            reason: CloseReason::RemoteExit,
        })
    }
}

struct MockExecutor {
    host: String,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

#[async_trait]
impl RemoteExecutor for MockExecutor {
    async fn exec(&self, _container_id: &str, _command: &[String]) -> Result<ExecOutput, AdmError> {
        unimplemented!()
    }

    async fn inspect(&self, _container_id: &str) -> Result<String, AdmError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.host == "h2" {
            return Err(AdmError::connection_failed("ops@10.0.0.2", "connection refused"));
        }
        Ok("running".to_string())
    }
}

impl SessionFactory for MockFactory {
    fn session(&self, host: &HostConfig) -> Result<Box<dyn RemoteSession>, AdmError> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            host: host.alias.clone(),
            state: SessionState::Idle,
            attaches: self.attaches.clone(),
        }))
    }

    fn executor(&self, host: &HostConfig) -> Result<Box<dyn RemoteExecutor>, AdmError> {
        Ok(Box::new(MockExecutor {
            host: host.alias.clone(),
            in_flight: self.in_flight.clone(),
            max_in_flight: self.max_in_flight.clone(),
        }))
    }
}

#[tokio::test]
async fn test_enter_by_instance_name() {
    let (ctx, store) = create_test_context(Settings::default());
    deploy(&ctx, &store, "mds_h1_0", "3f4a9c1b22de");

    let factory = MockFactory::default();
    let exit = enter(&ctx, &factory, "mds_h1_0").await.unwrap();
    assert_eq!(exit.exit_status(), 0);

    assert_eq!(factory.sessions.load(Ordering::SeqCst), 1);
    assert_eq!(
        factory.attaches.lock().unwrap().clone(),
        vec![(
            "h1".to_string(),
            "3f4a9c1b22de".to_string(),
            "/stratabs/mds".to_string()
        )]
    );
}

#[tokio::test]
async fn test_enter_by_service_identity() {
    let (ctx, store) = create_test_context(Settings::default());
    deploy(&ctx, &store, "chunkserver_h1_1", "c0ffee00beef");

    let dc = ctx.services.iter().find(|dc| dc.name() == "chunkserver_h1_1").unwrap();
    let identity = ServiceIdentity::of(CLUSTER, dc);

    let target = resolve(&ctx, identity.as_str()).await.unwrap();
    assert_eq!(target.service.name(), "chunkserver_h1_1");
    assert_eq!(target.identity, identity);
    assert_eq!(target.container_id, "c0ffee00beef");
    assert_eq!(target.host.alias, "h1");
    assert_eq!(target.workdir, "/stratabs/chunkserver");
}

#[tokio::test]
async fn test_undeployed_service_never_reaches_transport() {
    let (ctx, _store) = create_test_context(Settings::default());
    let factory = MockFactory::default();

    let result = enter(&ctx, &factory, "mds_h1_0").await;
    assert!(matches!(result, Err(AdmError::ContainerNotFound(_))));
    assert_eq!(factory.sessions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_selection_errors() {
    let (ctx, _store) = create_test_context(Settings::default());
    let factory = MockFactory::default();

    let result = enter(&ctx, &factory, "mds_h9_0").await;
    assert!(matches!(result, Err(AdmError::NoServicesMatched)));

    let result = enter(&ctx, &factory, "not an id").await;
    assert!(matches!(result, Err(AdmError::InvalidArgument(_))));

    assert_eq!(factory.sessions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unavailable_state_is_reported() {
    let (ctx, store) = create_test_context(Settings::default());
    deploy(&ctx, &store, "mds_h1_0", "3f4a9c1b22de");
    store.set_unavailable(true);

    let factory = MockFactory::default();
    let result = enter(&ctx, &factory, "mds_h1_0").await;
    assert!(matches!(result, Err(AdmError::StateUnavailable(_))));
    assert_eq!(factory.sessions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unsupported_protocol() {
    let (ctx, store) = create_test_context(Settings::default());
    deploy(&ctx, &store, "mds_h3_0", "3f4a9c1b22de");

    let factory = TransportFactory::new(Settings::default());
    match enter(&ctx, &factory, "mds_h3_0").await {
        Err(AdmError::ProtocolUnsupported(name)) => assert_eq!(name, "telnet"),
        other => panic!("expected ProtocolUnsupported, got {:?}", other),
    }
}

/// ssh stand-in that records its arguments to `log`
fn write_recording_ssh(dir: &Path, log: &Path, status: i32) -> PathBuf {
    let path = dir.join("ssh");
    let script = format!(
        "#!/bin/sh\necho \"$@\" > '{}'\necho running\nexit {}\n",
        log.display(),
        status
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn create_transport_registry(agent_port: u16) -> HostRegistry {
    let decl: HostsDeclaration = serde_json::from_value(json!({
        "hosts": [
            { "host": "h1", "hostname": "10.0.0.1", "user": "ops" },
            { "host": "agent1", "hostname": "127.0.0.1", "protocol": "http", "http_port": agent_port }
        ]
    }))
    .unwrap();
    HostRegistry::load(&decl).unwrap()
}

#[tokio::test]
async fn test_ssh_host_routes_through_shell() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("ssh.log");
    let mut settings = Settings::default();
    settings.ssh.binary = write_recording_ssh(dir.path(), &log, 0).display().to_string();

    let factory = TransportFactory::new(settings);
    let registry = create_transport_registry(9000);
    let host = registry.resolve("h1").unwrap();

    let executor = factory.executor(host).unwrap();
    assert_eq!(executor.inspect("3f4a9c1b22de").await.unwrap(), "running");

    let args = std::fs::read_to_string(&log).unwrap();
    assert!(args.contains("ops@10.0.0.1"));
    assert!(args.contains("sudo docker inspect --format"));
    assert!(!args.contains("http://"));
    assert!(!args.contains(":9000"));
}

#[tokio::test]
async fn test_ssh_host_session_runs_shell_client() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("ssh.log");
    let mut settings = Settings::default();
    settings.ssh.binary = write_recording_ssh(dir.path(), &log, 3).display().to_string();

    let factory = TransportFactory::new(settings);
    let registry = create_transport_registry(9000);
    let mut session = factory.session(registry.resolve("h1").unwrap()).unwrap();

    let exit = session.attach("3f4a9c1b22de", "/stratabs/mds").await.unwrap();
    assert_eq!(exit.code, Some(3));
    assert_eq!(exit.reason, CloseReason::RemoteExit);

    let args = std::fs::read_to_string(&log).unwrap();
    assert!(args.starts_with("-tt"));
    assert!(args.contains("exec -it 3f4a9c1b22de"));
}

#[tokio::test]
async fn test_http_host_targets_agent_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("ssh.log");
    let mut settings = Settings::default();
    settings.ssh.binary = write_recording_ssh(dir.path(), &log, 0).display().to_string();

    // Nothing listens on a port freed right away
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let factory = TransportFactory::new(settings);
    let registry = create_transport_registry(port);
    let executor = factory.executor(registry.resolve("agent1").unwrap()).unwrap();

    match executor.inspect("3f4a9c1b22de").await {
        Err(AdmError::ConnectionFailed { target, .. }) => {
            assert_eq!(target, format!("127.0.0.1:{}", port))
        }
        other => panic!("expected ConnectionFailed, got {:?}", other),
    }
    assert!(!log.exists());
}

#[tokio::test]
async fn test_context_rejects_unknown_hosts() {
    let topology: TopologyDeclaration = serde_json::from_value(json!({
        "cluster": CLUSTER,
        "kind": "bs",
        "services": [{ "role": "mds", "deploy": [{ "host": "h7" }] }]
    }))
    .unwrap();

    let result = AppContext::new(
        Settings::default(),
        &create_test_hosts(),
        &topology,
        Arc::new(MemoryStateStore::new()),
    );
    assert!(matches!(result, Err(AdmError::InvalidTopology(_))));
}

#[tokio::test]
async fn test_status_reports_every_service() {
    let settings = Settings {
        status_concurrency: 2,
        ..Settings::default()
    };
    let (ctx, store) = create_test_context(settings);
    for (name, container) in [
        ("etcd_h1_0", "e1"),
        ("etcd_h2_0", "e2"),
        ("mds_h1_0", "m1"),
        ("chunkserver_h1_0", "c0"),
        ("chunkserver_h1_1", "c1"),
    ] {
        deploy(&ctx, &store, name, container);
    }

    let factory = MockFactory::default();
    let rows = status(&ctx, &factory, &FilterOption::all()).await.unwrap();

    let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "etcd_h1_0",
            "etcd_h2_0",
            "mds_h1_0",
            "mds_h2_0",
            "mds_h3_0",
            "chunkserver_h1_0",
            "chunkserver_h1_1",
        ]
    );

    assert_eq!(rows[0].status.as_deref(), Some("running"));
    assert_eq!(rows[0].container_id.as_deref(), Some("e1"));

    // Host failure is recorded in its row only
    assert!(rows[1].status.is_none());
    assert!(rows[1].error.as_deref().unwrap().contains("connection refused"));

    // Not deployed
    assert!(rows[3].container_id.is_none());
    assert!(rows[3].error.is_some());

    assert_eq!(rows[6].status.as_deref(), Some("running"));
    assert!(factory.max_in_flight.load(Ordering::SeqCst) <= 2);
    assert_eq!(factory.sessions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_status_filter() {
    let (ctx, store) = create_test_context(Settings::default());
    deploy(&ctx, &store, "mds_h1_0", "m1");

    let factory = MockFactory::default();
    let filter = FilterOption {
        role: Match::parse("mds"),
        host: Match::parse("h1"),
        ..FilterOption::all()
    };
    let rows = status(&ctx, &factory, &filter).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].role, "mds");
    assert_eq!(rows[0].status.as_deref(), Some("running"));

    let filter = FilterOption {
        role: Match::parse("metaserver"),
        ..FilterOption::all()
    };
    assert!(matches!(
        status(&ctx, &factory, &filter).await,
        Err(AdmError::NoServicesMatched)
    ));
}
