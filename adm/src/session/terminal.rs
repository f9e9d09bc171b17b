//! Local terminal plumbing for interactive sessions.
//!
//! Keystrokes, size changes and termination signals are turned into
//! [`LocalEvent`]s on one channel, which the transports relay to the remote
//! side.

use std::io::{IsTerminal, Read};
use std::pin::Pin;

use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::AdmError;

const DEFAULT_SIZE: (u16, u16) = (80, 24);
const EVENT_BUFFER: usize = 64;

/// Ctrl-P Ctrl-Q, the container engines' detach sequence
pub const DETACH_KEYS: [u8; 2] = [0x10, 0x11];

/// Something that happened on the local side of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEvent {
    /// Bytes read from stdin
    Input(Vec<u8>),

    /// stdin reached end of file
    Eof,

    /// Terminal resized to `cols` x `rows`
    Resize { cols: u16, rows: u16 },

    /// Leave the remote process running
    Detach,

    /// Local termination signal, by name
    Interrupt(String),
}

/// Splits stdin bytes into input and detach requests.
///
/// A partial detach sequence is held back until the next read shows whether
/// it completes.
#[derive(Debug)]
pub struct DetachKeys {
    keys: Vec<u8>,
    matched: usize,
}

impl Default for DetachKeys {
    fn default() -> Self {
        Self::new(&DETACH_KEYS)
    }
}

impl DetachKeys {
    pub fn new(keys: &[u8]) -> Self {
        Self {
            keys: keys.to_vec(),
            matched: 0,
        }
    }

    /// Events for one read. Bytes after a detach are dropped.
    pub fn feed(&mut self, input: &[u8]) -> Vec<LocalEvent> {
        let mut events = Vec::new();
        let mut pending = Vec::with_capacity(input.len());

        for &byte in input {
            if self.keys.is_empty() {
                pending.push(byte);
                continue;
            }
            if byte == self.keys[self.matched] {
                self.matched += 1;
                if self.matched == self.keys.len() {
                    self.matched = 0;
                    if !pending.is_empty() {
                        events.push(LocalEvent::Input(pending));
                    }
                    events.push(LocalEvent::Detach);
                    return events;
                }
                continue;
            }

            pending.extend_from_slice(&self.keys[..self.matched]);
            self.matched = 0;
            if byte == self.keys[0] {
                self.matched = 1;
            } else {
                pending.push(byte);
            }
        }

        if !pending.is_empty() {
            events.push(LocalEvent::Input(pending));
        }
        events
    }

    /// Held-back bytes once stdin has ended
    pub fn finish(&mut self) -> Option<LocalEvent> {
        let held = std::mem::take(&mut self.matched);
        (held > 0).then(|| LocalEvent::Input(self.keys[..held].to_vec()))
    }
}

/// Keeps the local terminal in raw mode while alive
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn enable() -> Result<Self, AdmError> {
        crossterm::terminal::enable_raw_mode()
            .map_err(|e| AdmError::Internal(format!("failed to enable raw mode: {e}")))?;
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = crossterm::terminal::disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Current terminal size as (cols, rows)
pub fn terminal_size() -> (u16, u16) {
    crossterm::terminal::size().unwrap_or(DEFAULT_SIZE)
}

/// Local side of one interactive session
pub struct SessionIo {
    pub events: mpsc::Receiver<LocalEvent>,
    pub stdout: Pin<Box<dyn AsyncWrite + Send>>,
    pub stderr: Pin<Box<dyn AsyncWrite + Send>>,
    /// Initial size as (cols, rows)
    pub size: (u16, u16),
    _raw_mode: Option<RawModeGuard>,
}

impl SessionIo {
    /// Session I/O over arbitrary channels and writers
    pub fn new(
        events: mpsc::Receiver<LocalEvent>,
        stdout: impl AsyncWrite + Send + 'static,
        stderr: impl AsyncWrite + Send + 'static,
        size: (u16, u16),
    ) -> Self {
        Self {
            events,
            stdout: Box::pin(stdout),
            stderr: Box::pin(stderr),
            size,
            _raw_mode: None,
        }
    }

    /// Session I/O bound to the process terminal.
    ///
    /// Raw mode is enabled when stdin is a TTY and restored when the value
    /// is dropped.
    pub fn terminal() -> Result<Self, AdmError> {
        let raw_mode = if std::io::stdin().is_terminal() {
            Some(RawModeGuard::enable()?)
        } else {
            None
        };

        let io = Self {
            events: spawn_local_events(),
            stdout: Box::pin(tokio::io::stdout()),
            stderr: Box::pin(tokio::io::stderr()),
            size: terminal_size(),
            _raw_mode: raw_mode,
        };
        Ok(io)
    }
}

/// Start forwarding stdin, resizes and termination signals
fn spawn_local_events() -> mpsc::Receiver<LocalEvent> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);

    // Plain thread: a read blocked on stdin must not hold up runtime shutdown.
    let stdin_tx = tx.clone();
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; 4096];
        let mut detach = DetachKeys::default();

        debug!("Stdin read loop started");

        'read: loop {
            let n = match stdin.read(&mut buf) {
                Ok(n) => n,
                Err(e) => {
                    warn!("Stdin read error: {}", e);
                    0
                }
            };
            if n == 0 {
                if let Some(held) = detach.finish() {
                    let _ = stdin_tx.blocking_send(held);
                }
                let _ = stdin_tx.blocking_send(LocalEvent::Eof);
                break;
            }

            for event in detach.feed(&buf[..n]) {
                let detached = event == LocalEvent::Detach;
                if stdin_tx.blocking_send(event).is_err() || detached {
                    break 'read;
                }
            }
        }

        debug!("Stdin read loop ended");
    });

    #[cfg(unix)]
    {
        let resize_tx = tx.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            let mut winch = match signal(SignalKind::window_change()) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Cannot watch terminal size: {}", e);
                    return;
                }
            };
            while winch.recv().await.is_some() {
                let (cols, rows) = terminal_size();
                if resize_tx.send(LocalEvent::Resize { cols, rows }).await.is_err() {
                    break;
                }
            }
        });
    }

    tokio::spawn(async move {
        let name = termination_signal().await;
        let _ = tx.send(LocalEvent::Interrupt(name.to_string())).await;
    });

    rx
}

/// Resolves when the process receives a termination signal
pub async fn termination_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (Ok(mut term), Ok(mut hup)) =
            (signal(SignalKind::terminate()), signal(SignalKind::hangup()))
        else {
            warn!("Cannot install termination signal handlers");
            return std::future::pending().await;
        };

        let name = tokio::select! {
            _ = term.recv() => "SIGTERM",
            _ = hup.recv() => "SIGHUP",
            Ok(()) = tokio::signal::ctrl_c() => "SIGINT",
        };
        info!("{} received", name);
        name
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            return std::future::pending().await;
        }
        info!("Ctrl+C received");
        "SIGINT"
    }
}
