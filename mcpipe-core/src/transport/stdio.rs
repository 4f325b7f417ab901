//! Standard I/O transport implementation
//!
//! Frames are newline-terminated. The peer is usually a child process spawned
//! from [`ServerParameters`]; any pair of async streams works too.

use super::*;
use crate::Error;
use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;
type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;

/// Default time a peer gets to exit after its stdin is closed
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Default limit on the length of one incoming frame, in bytes
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// How to launch the peer process
///
/// ```rust
/// use mcpipe_core::transport::ServerParameters;
///
/// let params = ServerParameters::new("python")
///     .with_args(["server.py"])
///     .with_env("LOG_LEVEL", "debug");
/// assert_eq!(params.args, vec!["server.py".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerParameters {
    /// Program to execute
    pub command: String,
    /// Arguments passed to the program
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables, added to the inherited environment
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working directory for the process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

impl ServerParameters {
    /// Parameters for `command` with no arguments
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    /// Replace the argument list
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add one environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Standard I/O transport for communicating with a peer process
pub struct StdioTransport {
    writer: StdioWriter,
    reader: StdioReader,
    stats: Arc<TransportStats>,
}

/// Writer half: the peer's stdin plus the process handle
pub struct StdioWriter {
    sink: Option<BoxedWrite>,
    child: Arc<ChildSlot>,
    grace: Duration,
    stats: Arc<TransportStats>,
}

/// Reader half: the peer's stdout
pub struct StdioReader {
    source: BufReader<BoxedRead>,
    buf: Vec<u8>,
    max_frame_size: usize,
    stats: Arc<TransportStats>,
}

/// The spawned process, shared by the writer and the [`PeerHandle`]
#[derive(Debug, Default)]
struct ChildSlot(Mutex<Option<Child>>);

impl StdioTransport {
    /// Create a new stdio transport by spawning the peer process.
    ///
    /// The child is killed if the transport is dropped without being closed.
    /// Its stderr is forwarded to `tracing` under the `mcpipe::peer` target.
    pub async fn spawn(params: &ServerParameters, grace: Duration) -> Result<Self> {
        let mut cmd = Command::new(&params.command);
        cmd.args(&params.args)
            .envs(&params.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &params.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| {
            TransportError::ConnectionFailed(format!(
                "Failed to spawn command '{}': {e}",
                params.command
            ))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            TransportError::ConnectionFailed("Failed to get stdin handle".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            TransportError::ConnectionFailed("Failed to get stdout handle".to_string())
        })?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr, params.command.clone()));
        }

        debug!(command = %params.command, pid = ?child.id(), "spawned peer process");
        Ok(Self::from_parts(
            Box::new(stdout),
            Box::new(stdin),
            Some(child),
            grace,
        ))
    }

    /// Create a transport over an arbitrary pair of streams
    pub fn from_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::from_parts(Box::new(reader), Box::new(writer), None, DEFAULT_SHUTDOWN_GRACE)
    }

    fn from_parts(
        reader: BoxedRead,
        writer: BoxedWrite,
        child: Option<Child>,
        grace: Duration,
    ) -> Self {
        let stats = Arc::new(TransportStats::default());
        Self {
            writer: StdioWriter {
                sink: Some(writer),
                child: Arc::new(ChildSlot(Mutex::new(child))),
                grace,
                stats: stats.clone(),
            },
            reader: StdioReader {
                source: BufReader::new(reader),
                buf: Vec::new(),
                max_frame_size: DEFAULT_MAX_FRAME_SIZE,
                stats: stats.clone(),
            },
            stats,
        }
    }

    /// Reject incoming frames longer than `bytes` (newline excluded)
    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.reader.max_frame_size = bytes;
        self
    }

    /// Send one frame
    pub async fn send(&mut self, frame: &str) -> Result<()> {
        self.writer.send(frame).await
    }

    /// Receive one frame
    pub async fn receive(&mut self) -> Result<String> {
        self.reader.receive().await
    }

    /// Close the transport, reaping the child process if there is one
    pub async fn close(&mut self) -> Result<()> {
        self.writer.close().await
    }

    /// Check if the transport can still send
    pub fn is_connected(&self) -> bool {
        self.writer.is_connected()
    }

    /// Process id of the spawned peer, while it is owned by this transport
    pub fn peer_pid(&self) -> Option<u32> {
        let slot = self.writer.child.0.try_lock().ok()?;
        slot.as_ref().and_then(Child::id)
    }
}

impl Transport for StdioTransport {
    fn transport_type(&self) -> &'static str {
        "stdio"
    }

    fn into_split(self: Box<Self>) -> (Box<dyn FrameWriter>, Box<dyn FrameReader>) {
        let this = *self;
        (Box::new(this.writer), Box::new(this.reader))
    }

    fn stats(&self) -> Arc<TransportStats> {
        self.stats.clone()
    }

    fn peer_handle(&self) -> Option<Arc<dyn PeerHandle>> {
        let handle: Arc<dyn PeerHandle> = self.writer.child.clone();
        Some(handle)
    }
}

#[async_trait]
impl PeerHandle for ChildSlot {
    async fn kill(&self) -> Result<()> {
        let mut slot = self.0.lock().await;
        let Some(child) = slot.as_mut() else {
            return Ok(());
        };
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }
        warn!(pid = ?child.id(), "killing unresponsive peer process");
        child.kill().await.map_err(|e| {
            TransportError::ConnectionFailed(format!("Failed to kill child process: {e}"))
        })?;
        Ok(())
    }
}

#[async_trait]
impl FrameWriter for StdioWriter {
    async fn send(&mut self, frame: &str) -> Result<()> {
        if frame.contains('\n') {
            return Err(TransportError::InvalidMessageFormat.into());
        }
        let Some(sink) = self.sink.as_mut() else {
            return Err(TransportError::Closed.into());
        };

        trace!("Sending frame via stdio: {}", frame);
        let mut line = String::with_capacity(frame.len() + 1);
        line.push_str(frame);
        line.push('\n');

        sink.write_all(line.as_bytes())
            .await
            .map_err(|e| TransportError::SendFailed(format!("Failed to write frame: {e}")))?;
        sink.flush()
            .await
            .map_err(|e| TransportError::SendFailed(format!("Failed to flush frame: {e}")))?;

        self.stats.record_sent(line.len());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut sink) = self.sink.take() {
            debug!("Closing stdio transport");
            let _ = sink.shutdown().await;
        }

        let child = self.child.0.lock().await.take();
        if let Some(mut child) = child {
            match tokio::time::timeout(self.grace, child.wait()).await {
                Ok(Ok(status)) => debug!(%status, "peer process exited"),
                Ok(Err(e)) => warn!("Failed to wait for peer process: {}", e),
                Err(_) => {
                    debug!(
                        grace_ms = self.grace.as_millis() as u64,
                        "peer process still running after stdin closed, killing it"
                    );
                    child.kill().await.map_err(|e| {
                        TransportError::ConnectionFailed(format!(
                            "Failed to kill child process: {e}"
                        ))
                    })?;
                }
            }
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.sink.is_some()
    }
}

#[async_trait]
impl FrameReader for StdioReader {
    async fn receive(&mut self) -> Result<String> {
        loop {
            self.buf.clear();
            let limit = self.max_frame_size as u64 + 1;
            let read = (&mut self.source)
                .take(limit)
                .read_until(b'\n', &mut self.buf)
                .await
                .map_err(read_failed)?;

            if read == 0 {
                return Err(Error::ConnectionClosed);
            }
            if self.buf.last() != Some(&b'\n') {
                if read as u64 == limit {
                    self.discard_line().await.map_err(read_failed)?;
                    warn!(limit = self.max_frame_size, "discarding oversized frame");
                    return Err(Error::malformed(format!(
                        "frame exceeds {} bytes",
                        self.max_frame_size
                    )));
                }
                warn!(bytes = read, "peer stream ended mid-frame, discarding partial frame");
                return Err(Error::ConnectionClosed);
            }

            let mut end = self.buf.len();
            while end > 0 && matches!(self.buf[end - 1], b'\n' | b'\r') {
                end -= 1;
            }
            let bytes = &self.buf[..end];
            if bytes.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            self.stats.record_received(read);
            let frame = std::str::from_utf8(bytes)
                .map_err(|_| Error::malformed("frame is not valid UTF-8"))?;
            trace!("Received frame: {}", frame);
            return Ok(frame.to_string());
        }
    }
}

impl StdioReader {
    /// Skip the rest of the current line
    async fn discard_line(&mut self) -> std::io::Result<()> {
        loop {
            let (consumed, done) = {
                let available = self.source.fill_buf().await?;
                match available.iter().position(|b| *b == b'\n') {
                    Some(end) => (end + 1, true),
                    None => (available.len(), available.is_empty()),
                }
            };
            self.source.consume(consumed);
            if done {
                return Ok(());
            }
        }
    }
}

fn read_failed(e: std::io::Error) -> Error {
    warn!("Failed to read from peer: {}", e);
    TransportError::ReceiveFailed(format!("Failed to read from peer: {e}")).into()
}

async fn forward_stderr(stderr: ChildStderr, command: String) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => debug!(target: "mcpipe::peer", command = %command, "{}", line),
            Ok(None) => break,
            Err(e) => {
                trace!(target: "mcpipe::peer", "stopped reading peer stderr: {}", e);
                break;
            }
        }
    }
}
