//! Analysis Server Transport
//!
//! Owns the analysis-server child process and the newline-delimited JSON-RPC
//! framing over its standard streams. The transport is strictly half-duplex:
//! one request is written and exactly one response line is read back before
//! the next request may be issued. Callers serialize access through the
//! `McpClient` mutex.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use super::protocol::{JsonRpcRequest, JsonRpcResponse};
use super::AnalysisError;

/// Fixed settle time between spawning the server and the handshake
const STARTUP_GRACE: Duration = Duration::from_secs(2);

/// Upper bound on a single response read. Expiry is treated the same as a
/// closed stream so a hung server degrades instead of wedging the caller.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Command line used to launch the analysis server
#[derive(Debug, Clone)]
pub struct LauncherCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Lifecycle of the transport, tracked explicitly.
///
/// Requests are only accepted while `Starting` (handshake traffic) or
/// `Ready`; every other state rejects with `TransportClosed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    NotStarted,
    Starting,
    Ready,
    Failed,
    Stopped,
}

/// Child process plus its framed stdio streams
pub struct StdioTransport {
    state: TransportState,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self {
            state: TransportState::NotStarted,
            child: None,
            stdin: None,
            stdout: None,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == TransportState::Ready
    }

    /// Spawn the analysis server and wait out the startup grace period.
    ///
    /// Leaves the transport in `Starting`; the caller promotes it to `Ready`
    /// once the protocol handshake succeeds, or tears it down via `fail`.
    pub async fn spawn(&mut self, launcher: &LauncherCommand) -> Result<(), AnalysisError> {
        if find_launcher(&launcher.program).is_none() {
            warn!("launcher '{}' not found on PATH", launcher.program);
            self.state = TransportState::Failed;
            return Err(AnalysisError::LauncherMissing);
        }

        debug!("spawning analysis server: {} {:?}", launcher.program, launcher.args);
        let mut child = Command::new(&launcher.program)
            .args(&launcher.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                warn!("failed to spawn analysis server: {}", e);
                self.state = TransportState::Failed;
                AnalysisError::StartupFailed
            })?;

        self.state = TransportState::Starting;
        tokio::time::sleep(STARTUP_GRACE).await;

        // An immediate exit means the server never came up
        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                warn!("analysis server exited during startup: {}", status);
                self.state = TransportState::Failed;
                return Err(AnalysisError::StartupFailed);
            }
            Err(e) => {
                warn!("could not poll analysis server: {}", e);
                self.state = TransportState::Failed;
                return Err(AnalysisError::StartupFailed);
            }
        }

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        match (stdin, stdout) {
            (Some(stdin), Some(stdout)) => {
                self.stdin = Some(stdin);
                self.stdout = Some(BufReader::new(stdout));
                self.child = Some(child);
                Ok(())
            }
            _ => {
                let _ = child.start_kill();
                self.state = TransportState::Failed;
                Err(AnalysisError::StartupFailed)
            }
        }
    }

    /// Promote the transport to `Ready` after a successful handshake.
    pub fn mark_ready(&mut self) {
        self.state = TransportState::Ready;
    }

    /// Discard the process after a failed startup. No retry is attempted.
    pub async fn fail(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
        self.stdin = None;
        self.stdout = None;
        self.state = TransportState::Failed;
    }

    /// Write one request line, then block reading exactly one response line.
    pub async fn send_and_receive(
        &mut self,
        request: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, AnalysisError> {
        if !matches!(
            self.state,
            TransportState::Starting | TransportState::Ready
        ) {
            return Err(AnalysisError::TransportClosed);
        }

        let stdin = self.stdin.as_mut().ok_or(AnalysisError::TransportClosed)?;
        let stdout = self.stdout.as_mut().ok_or(AnalysisError::TransportClosed)?;

        let line =
            serde_json::to_string(request).map_err(|_| AnalysisError::MalformedResponse)?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|_| AnalysisError::TransportClosed)?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|_| AnalysisError::TransportClosed)?;
        stdin
            .flush()
            .await
            .map_err(|_| AnalysisError::TransportClosed)?;

        let mut response_line = String::new();
        let bytes_read = tokio::time::timeout(READ_TIMEOUT, stdout.read_line(&mut response_line))
            .await
            .map_err(|_| {
                warn!("timed out waiting for analysis server response");
                AnalysisError::TransportClosed
            })?
            .map_err(|_| AnalysisError::TransportClosed)?;

        if bytes_read == 0 {
            warn!("analysis server closed its stdout");
            return Err(AnalysisError::TransportClosed);
        }

        serde_json::from_str(response_line.trim()).map_err(|e| {
            warn!("unparseable analysis server response: {}", e);
            AnalysisError::MalformedResponse
        })
    }

    /// Kill the child if running. Idempotent, never blocks indefinitely.
    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
            debug!("analysis server terminated");
        }
        self.stdin = None;
        self.stdout = None;
        self.state = TransportState::Stopped;
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a launcher program against PATH. A name containing a path
/// separator is checked directly.
fn find_launcher(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_launcher_missing() {
        assert!(find_launcher("definitely-not-a-real-launcher-xyz").is_none());
    }

    #[test]
    fn test_find_launcher_present() {
        // `sh` exists on any unix PATH
        assert!(find_launcher("sh").is_some());
    }

    #[tokio::test]
    async fn test_spawn_missing_launcher() {
        let mut transport = StdioTransport::new();
        let launcher = LauncherCommand {
            program: "definitely-not-a-real-launcher-xyz".to_string(),
            args: vec![],
        };
        let result = transport.spawn(&launcher).await;
        assert!(matches!(result, Err(AnalysisError::LauncherMissing)));
        assert_eq!(transport.state(), TransportState::Failed);
    }

    #[tokio::test]
    async fn test_spawn_immediate_exit() {
        let mut transport = StdioTransport::new();
        let launcher = LauncherCommand {
            program: "true".to_string(),
            args: vec![],
        };
        let result = transport.spawn(&launcher).await;
        assert!(matches!(result, Err(AnalysisError::StartupFailed)));
    }

    #[tokio::test]
    async fn test_send_and_receive_echo() {
        // `cat` echoes the request line back; the request itself parses as
        // a response envelope with a matching id and no result.
        let mut transport = StdioTransport::new();
        let launcher = LauncherCommand {
            program: "cat".to_string(),
            args: vec![],
        };
        transport.spawn(&launcher).await.unwrap();

        let request = JsonRpcRequest::new(7, "tools/call", Some(json!({"name": "noop"})));
        let response = transport.send_and_receive(&request).await.unwrap();
        assert_eq!(response.id, Some(7));
        assert!(response.result.is_none());

        transport.stop().await;
    }

    #[tokio::test]
    async fn test_send_before_start_rejected() {
        let mut transport = StdioTransport::new();
        let request = JsonRpcRequest::new(1, "initialize", None);
        let result = transport.send_and_receive(&request).await;
        assert!(matches!(result, Err(AnalysisError::TransportClosed)));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut transport = StdioTransport::new();
        let launcher = LauncherCommand {
            program: "cat".to_string(),
            args: vec![],
        };
        transport.spawn(&launcher).await.unwrap();
        transport.stop().await;
        assert_eq!(transport.state(), TransportState::Stopped);
        transport.stop().await;
        assert_eq!(transport.state(), TransportState::Stopped);
        assert!(!transport.is_ready());
    }

    #[tokio::test]
    async fn test_send_after_stop_rejected() {
        let mut transport = StdioTransport::new();
        transport.stop().await;
        let request = JsonRpcRequest::new(1, "tools/call", None);
        let result = transport.send_and_receive(&request).await;
        assert!(matches!(result, Err(AnalysisError::TransportClosed)));
    }
}
