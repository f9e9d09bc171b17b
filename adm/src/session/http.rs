//! HTTP transport: container sessions through the host agent.
//!
//! Interactive sessions use a websocket carrying JSON frames from
//! `session-protocol`; exec and inspect are plain REST calls.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::{SinkExt, StreamExt};
use http::HeaderValue;
use reqwest::{header, Client, RequestBuilder, Response};
use secrecy::ExposeSecret;
use session_protocol::{AgentFrame, ClientFrame, ContainerInfo, ErrorResponse, ExecRequest, ExecResponse};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::AdmError;
use crate::hosts::HttpConfig;
use crate::session::terminal::{LocalEvent, SessionIo};
use crate::session::{
    validate_container_id, CloseReason, ExecOutput, RemoteExecutor, RemoteSession, SessionEvent,
    SessionExit, SessionFsm, SessionState,
};
use crate::storage::settings::Settings;
use crate::utils::generate_uuid;

type AgentSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Agent of one host
#[derive(Debug, Clone)]
pub struct AgentEndpoint {
    http: HttpConfig,
    client: Client,
    connect_timeout: Duration,
}

impl AgentEndpoint {
    pub fn new(http: HttpConfig, settings: &Settings) -> Result<Self, AdmError> {
        let connect_timeout = Duration::from_secs(settings.http.connect_timeout_secs);
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(Duration::from_secs(settings.http.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            client,
            connect_timeout,
        })
    }

    /// `<host-address>:<host-port>`
    pub fn endpoint(&self) -> String {
        self.http.endpoint()
    }

    /// Websocket URL of an attach
    pub fn attach_url(
        &self,
        container_id: &str,
        workdir: &str,
        session_id: &str,
        (cols, rows): (u16, u16),
    ) -> Result<Url, AdmError> {
        validate_container_id(container_id)?;
        let mut url = self.parse_url(&format!(
            "ws://{}/containers/{}/attach",
            self.endpoint(),
            container_id
        ))?;
        url.query_pairs_mut()
            .append_pair("session_id", session_id)
            .append_pair("workdir", workdir)
            .append_pair("cols", &cols.to_string())
            .append_pair("rows", &rows.to_string());
        Ok(url)
    }

    /// REST URL of a container, or of one of its actions
    pub fn rest_url(&self, container_id: &str, action: Option<&str>) -> Result<Url, AdmError> {
        validate_container_id(container_id)?;
        let mut url = format!("http://{}/containers/{}", self.endpoint(), container_id);
        if let Some(action) = action {
            url.push('/');
            url.push_str(action);
        }
        self.parse_url(&url)
    }

    fn parse_url(&self, url: &str) -> Result<Url, AdmError> {
        Url::parse(url).map_err(|e| {
            AdmError::ConfigError(format!("invalid agent endpoint {}: {}", self.endpoint(), e))
        })
    }

    fn bearer(&self) -> Option<String> {
        self.http
            .token
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose_secret()))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.bearer() {
            Some(bearer) => request.header(header::AUTHORIZATION, bearer),
            None => request,
        }
    }

    fn request_error(&self, err: reqwest::Error) -> AdmError {
        if err.is_connect() || err.is_timeout() {
            AdmError::connection_failed(self.endpoint(), err)
        } else {
            AdmError::HttpError(err)
        }
    }

    async fn check(&self, response: Response, container_id: &str) -> Result<Response, AdmError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        warn!("Agent {} returned {}: {}", self.endpoint(), status, message);

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AdmError::SessionError(format!(
                "container {} not found on agent {}",
                container_id,
                self.endpoint()
            )));
        }
        Err(AdmError::SessionError(format!(
            "agent {} returned {}: {}",
            self.endpoint(),
            status,
            message
        )))
    }

    async fn connect(&self, url: &Url) -> Result<AgentSocket, AdmError> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| AdmError::connection_failed(self.endpoint(), e))?;
        if let Some(bearer) = self.bearer() {
            let value = HeaderValue::from_str(&bearer)
                .map_err(|e| AdmError::ConfigError(format!("invalid agent token: {}", e)))?;
            request.headers_mut().insert(header::AUTHORIZATION, value);
        }

        let connected = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| AdmError::connection_failed(self.endpoint(), "connect timed out"))?;

        match connected {
            Ok((socket, _)) => Ok(socket),
            Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
                Err(AdmError::SessionError(format!(
                    "agent {} rejected attach: {}",
                    self.endpoint(),
                    response.status()
                )))
            }
            Err(e) => Err(AdmError::connection_failed(self.endpoint(), e)),
        }
    }
}

#[async_trait]
impl RemoteExecutor for AgentEndpoint {
    async fn exec(&self, container_id: &str, command: &[String]) -> Result<ExecOutput, AdmError> {
        let url = self.rest_url(container_id, Some("exec"))?;
        debug!("POST {}", url);

        let body = ExecRequest {
            command: command.to_vec(),
            workdir: None,
        };
        let response = self
            .authorized(self.client.post(url).json(&body))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let response = self.check(response, container_id).await?;

        let output: ExecResponse = response.json().await?;
        Ok(ExecOutput {
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    async fn inspect(&self, container_id: &str) -> Result<String, AdmError> {
        let url = self.rest_url(container_id, None)?;
        debug!("GET {}", url);

        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let response = self.check(response, container_id).await?;

        let info: ContainerInfo = response.json().await?;
        Ok(info.status)
    }
}

/// Interactive session over the agent's attach websocket
pub struct HttpSession {
    endpoint: AgentEndpoint,
    fsm: SessionFsm,
}

impl HttpSession {
    pub fn new(endpoint: AgentEndpoint) -> Self {
        Self {
            endpoint,
            fsm: SessionFsm::new(),
        }
    }

    pub fn endpoint(&self) -> &AgentEndpoint {
        &self.endpoint
    }

    /// Attach and relay `io` until the session ends
    pub async fn attach_with(
        &mut self,
        container_id: &str,
        workdir: &str,
        mut io: SessionIo,
    ) -> Result<SessionExit, AdmError> {
        self.fsm.process(SessionEvent::Connect)?;

        let session_id = generate_uuid();
        let socket = match self.endpoint.attach_url(container_id, workdir, &session_id, io.size) {
            Ok(url) => {
                info!("Attaching to {} through {}", container_id, self.endpoint.endpoint());
                debug!("Session {} url {}", session_id, url);
                self.endpoint.connect(&url).await
            }
            Err(e) => Err(e),
        };
        let mut socket = match socket {
            Ok(socket) => socket,
            Err(e) => {
                self.fsm.process(SessionEvent::ConnectFailed(e.to_string()))?;
                return Err(e);
            }
        };
        self.fsm.process(SessionEvent::Connected)?;

        let outcome = relay(&mut socket, &mut io).await;

        // Only release site of the socket
        if let Ok(Err(e)) = tokio::time::timeout(CLOSE_TIMEOUT, socket.close(None)).await {
            debug!("Closing session {}: {}", session_id, e);
        }

        match outcome {
            Ok(exit) => {
                debug!("Session {} closed: {:?}", session_id, exit.reason);
                self.fsm.process(SessionEvent::Close(exit.reason))?;
                Ok(exit)
            }
            Err(e) => {
                self.fsm.process(SessionEvent::Fail(e.to_string()))?;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl RemoteSession for HttpSession {
    fn state(&self) -> SessionState {
        self.fsm.state()
    }

    async fn attach(&mut self, container_id: &str, workdir: &str) -> Result<SessionExit, AdmError> {
        if self.fsm.state() != SessionState::Idle {
            return Err(AdmError::SessionError(format!(
                "session already used ({:?})",
                self.fsm.state()
            )));
        }
        let io = SessionIo::terminal()?;
        self.attach_with(container_id, workdir, io).await
    }
}

async fn send(socket: &mut AgentSocket, frame: &ClientFrame) -> Result<(), AdmError> {
    let text = serde_json::to_string(frame)?;
    socket
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| AdmError::SessionError(format!("failed to send frame: {}", e)))
}

/// Relay local events and agent frames until one side ends the session.
///
/// Local events win over pending output so an interrupt is not starved by a
/// chatty container.
async fn relay(socket: &mut AgentSocket, io: &mut SessionIo) -> Result<SessionExit, AdmError> {
    let mut local_open = true;

    loop {
        tokio::select! {
            biased;

            event = io.events.recv(), if local_open => match event {
                Some(LocalEvent::Input(data)) => {
                    send(socket, &ClientFrame::Stdin { data: BASE64.encode(data) }).await?;
                }
                Some(LocalEvent::Eof) => {
                    send(socket, &ClientFrame::StdinClose).await?;
                }
                Some(LocalEvent::Resize { cols, rows }) => {
                    send(socket, &ClientFrame::Resize { cols, rows }).await?;
                }
                Some(LocalEvent::Detach) => {
                    send(socket, &ClientFrame::Detach).await?;
                    return Ok(SessionExit { code: None, reason: CloseReason::Detached });
                }
                Some(LocalEvent::Interrupt(name)) => {
                    if let Err(e) = send(socket, &ClientFrame::Signal { name }).await {
                        warn!("Could not forward signal: {}", e);
                    }
                    return Ok(SessionExit { code: None, reason: CloseReason::Interrupted });
                }
                None => local_open = false,
            },

            message = socket.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<AgentFrame>(text.as_str()) {
                        Ok(AgentFrame::Stdout { data }) => {
                            write_output(&mut io.stdout, &data).await?;
                        }
                        Ok(AgentFrame::Stderr { data }) => {
                            write_output(&mut io.stderr, &data).await?;
                        }
                        Ok(AgentFrame::Exit { code }) => {
                            return Ok(SessionExit { code, reason: CloseReason::RemoteExit });
                        }
                        Ok(AgentFrame::Error { message }) => {
                            return Err(AdmError::SessionError(message));
                        }
                        Err(e) => {
                            return Err(AdmError::SessionError(format!("malformed agent frame: {}", e)));
                        }
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    io.stdout.write_all(&data).await?;
                    io.stdout.flush().await?;
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Ok(SessionExit { code: None, reason: CloseReason::RemoteEof });
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Err(AdmError::SessionError(format!("attach stream failed: {}", e)));
                }
            },
        }
    }
}

async fn write_output<W>(out: &mut W, data: &str) -> Result<(), AdmError>
where
    W: tokio::io::AsyncWrite + Unpin + ?Sized,
{
    let bytes = BASE64
        .decode(data)
        .map_err(|e| AdmError::SessionError(format!("invalid output payload: {}", e)))?;
    out.write_all(&bytes).await?;
    out.flush().await?;
    Ok(())
}
