//! # mcpipe Client
//!
//! A high-level client for Model Context Protocol servers that run as child
//! processes and talk newline-delimited JSON-RPC over stdin/stdout.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mcpipe_client::McpClient;
//! use mcpipe_core::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = McpClient::connect_stdio(
//!         "python",
//!         &["weather_server.py"],
//!         Implementation {
//!             name: "weather-client".to_string(),
//!             version: "1.0.0".to_string(),
//!         },
//!         ClientCapabilities::default(),
//!     )
//!     .await?;
//!
//!     for tool in client.list_capabilities(CapabilityKind::Tools).await? {
//!         println!("{} - {}", tool.name, tool.description.as_deref().unwrap_or(""));
//!     }
//!
//!     let arguments = json!({"path": "test.md"}).as_object().cloned().unwrap_or_default();
//!     let result = client.invoke(CapabilityKind::Tools, "read_file", arguments).await?;
//!     println!("{}", result.text());
//!
//!     client.close().await
//! }
//! ```
//!
//! ## Lifecycle
//!
//! A client moves through `Disconnected -> Connecting -> Ready -> Closing ->
//! Closed`. Requests are accepted only while `Ready`. When the server exits
//! every in-flight call fails with [`Error::ConnectionClosed`] and later calls
//! fail with [`Error::ShuttingDown`]; a closed client is never reconnected.

use mcpipe_core::prelude::*;
use mcpipe_core::transport::TransportStatsSnapshot;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

/// Outcome of [`McpClient::invoke`], one variant per capability kind
#[derive(Debug, Clone)]
pub enum InvocationResult {
    /// Result of `tools/call`
    Tool(ToolsCallResponse),
    /// Result of `prompts/get`
    Prompt(PromptsGetResponse),
    /// Result of `resources/read`
    Resource(ResourcesReadResponse),
}

impl InvocationResult {
    /// Kind of capability that produced this result
    pub fn kind(&self) -> CapabilityKind {
        match self {
            InvocationResult::Tool(_) => CapabilityKind::Tools,
            InvocationResult::Prompt(_) => CapabilityKind::Prompts,
            InvocationResult::Resource(_) => CapabilityKind::Resources,
        }
    }

    /// All text in the result, joined by newlines
    pub fn text(&self) -> String {
        match self {
            InvocationResult::Tool(result) => result.text(),
            InvocationResult::Prompt(result) => result
                .messages
                .iter()
                .filter_map(|message| message.content.as_text())
                .collect::<Vec<_>>()
                .join("\n"),
            InvocationResult::Resource(result) => result
                .contents
                .iter()
                .filter_map(|contents| contents.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Default)]
struct ClientInner {
    session: Option<Arc<Session>>,
    events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    connecting: bool,
    closed: bool,
}

/// High-level MCP client for connecting to and interacting with MCP servers.
///
/// The client owns the server process once connected: [`McpClient::close`]
/// (or dropping the client) ends it. Every operation takes `&self`, so one
/// client can be shared behind an `Arc` and used by many tasks at once;
/// responses are matched to their callers whatever order they arrive in.
///
/// # Examples
///
/// ```rust,no_run
/// use mcpipe_client::McpClient;
/// use mcpipe_core::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() -> Result<()> {
/// let client = McpClient::new(ClientConfig::default());
/// client
///     .connect(ServerParameters::new("python").with_args(["server.py"]))
///     .await?;
///
/// let prompts = client.list_capabilities(CapabilityKind::Prompts).await?;
/// println!("{} prompts", prompts.len());
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct McpClient {
    config: ClientConfig,
    inner: Mutex<ClientInner>,
}

impl McpClient {
    /// Create a disconnected client with the given configuration
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(ClientInner::default()),
        }
    }

    /// Connect to an MCP server via stdio (process communication).
    ///
    /// This is a convenience method for the most common way of reaching an
    /// MCP server: launch it as a child process and talk over its
    /// stdin/stdout.
    ///
    /// # Arguments
    ///
    /// * `command` - The command to execute (e.g., "python", "node", "./my-server")
    /// * `args` - Command line arguments to pass to the command
    /// * `client_info` - Information about this client implementation
    /// * `capabilities` - Capabilities this client supports
    ///
    /// # Errors
    ///
    /// This method can fail if:
    /// - The command cannot be executed (not found, permissions, etc.)
    /// - The server process exits before answering `initialize`
    /// - The server answers `initialize` with an error or an invalid result
    pub async fn connect_stdio(
        command: &str,
        args: &[&str],
        client_info: Implementation,
        capabilities: ClientCapabilities,
    ) -> Result<Self> {
        let config = ClientConfig {
            client_info,
            capabilities,
            ..ClientConfig::default()
        };
        let client = Self::new(config);
        client
            .connect(ServerParameters::new(command).with_args(args.iter().copied()))
            .await?;
        Ok(client)
    }

    /// Launch the server described by `params` and perform the handshake.
    ///
    /// On any failure the child process is terminated, nothing is left
    /// pending and the client is back in
    /// [`ConnectionState::Disconnected`].
    pub async fn connect(&self, params: ServerParameters) -> Result<()> {
        self.begin_connect().await?;
        debug!(command = %params.command, args = ?params.args, "connecting to server");

        let transport = match StdioTransport::spawn(&params, self.config.shutdown_grace()).await
        {
            Ok(transport) => transport,
            Err(e) => {
                self.inner.lock().await.connecting = false;
                return Err(e);
            }
        };
        self.attach(Box::new(transport)).await
    }

    /// Connect to the server named in the configuration's `server` entry
    pub async fn connect_configured(&self) -> Result<()> {
        let params = self
            .config
            .server
            .clone()
            .ok_or_else(|| Error::configuration("no server configured"))?;
        self.connect(params).await
    }

    /// Perform the handshake over an already established transport.
    ///
    /// Used for servers reached some other way than spawning them, such as a
    /// pair of pipes handed over by a supervisor.
    pub async fn connect_transport(&self, transport: Box<dyn Transport>) -> Result<()> {
        self.begin_connect().await?;
        self.attach(transport).await
    }

    async fn begin_connect(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(Error::ShuttingDown);
        }
        if inner.connecting || inner.session.is_some() {
            return Err(Error::configuration("client is already connected"));
        }
        inner.connecting = true;
        Ok(())
    }

    async fn attach(&self, transport: Box<dyn Transport>) -> Result<()> {
        let (session, events) = Session::start(transport, &self.config);
        let session = Arc::new(session);

        // Published before the handshake so `close` can tear it down.
        {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                inner.connecting = false;
                drop(inner);
                session.close().await?;
                return Err(Error::ShuttingDown);
            }
            inner.session = Some(session.clone());
        }

        let handshake = session
            .initialize(
                self.config.client_info.clone(),
                self.config.capabilities.clone(),
            )
            .await;

        let mut inner = self.inner.lock().await;
        inner.connecting = false;
        let error = match handshake {
            Ok(response) if !inner.closed => {
                info!(
                    server = %response.server_info.name,
                    version = %response.server_info.version,
                    session = %session.id(),
                    "connected"
                );
                inner.events = Some(events);
                return Ok(());
            }
            Ok(_) => Error::ShuttingDown,
            Err(e) => e,
        };

        inner.session = None;
        let closed = inner.closed;
        drop(inner);
        if closed {
            debug!("client closed during the handshake");
        } else {
            warn!("handshake failed: {}", error);
        }
        session.close().await?;
        Err(error)
    }

    /// Close the connection and terminate the server process.
    ///
    /// Pending calls fail with [`Error::ShuttingDown`]. A connect still in
    /// its handshake is aborted and fails the same way. Calling this more
    /// than once, or on a client that never connected, is harmless.
    pub async fn close(&self) -> Result<()> {
        let session = {
            let mut inner = self.inner.lock().await;
            inner.closed = true;
            inner.session.clone()
        };
        match session {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }

    /// Current lifecycle state
    pub async fn state(&self) -> ConnectionState {
        let inner = self.inner.lock().await;
        match &inner.session {
            Some(session) => session.connection_state().await,
            None if inner.connecting => ConnectionState::Connecting,
            None if inner.closed => ConnectionState::Closed,
            None => ConnectionState::Disconnected,
        }
    }

    /// Snapshot of the session, once connected
    pub async fn session_state(&self) -> Option<SessionState> {
        let session = self.inner.lock().await.session.clone()?;
        Some(session.state().await)
    }

    /// Name and version the server announced during the handshake
    pub async fn server_info(&self) -> Option<Implementation> {
        self.session_state().await?.server_info
    }

    /// Capabilities the server announced during the handshake
    pub async fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.session_state().await?.server_capabilities
    }

    /// Take the stream of session events (notifications, disconnects).
    ///
    /// Returns `None` before connecting and after the first call.
    pub async fn take_events(&self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.inner.lock().await.events.take()
    }

    /// Transport counters, once connected
    pub async fn stats(&self) -> Option<TransportStatsSnapshot> {
        Some(self.inner.lock().await.session.as_ref()?.stats())
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get information about this client implementation
    pub fn client_info(&self) -> &Implementation {
        &self.config.client_info
    }

    /// Get the capabilities announced by this client
    pub fn client_capabilities(&self) -> &ClientCapabilities {
        &self.config.capabilities
    }

    async fn session(&self) -> Result<Arc<Session>> {
        let inner = self.inner.lock().await;
        match &inner.session {
            Some(session) => Ok(session.clone()),
            None if inner.closed => Err(Error::ShuttingDown),
            None => Err(TransportError::NotReady.into()),
        }
    }

    /// List every capability of one kind.
    ///
    /// Follows `nextCursor` until the server stops returning one, so the
    /// result is the complete, ordered listing. A cursor the server already
    /// returned once ends the walk.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Remote`] when the server answers with an error and
    /// with [`Error::SchemaViolation`] when a page or entry has the wrong
    /// shape, plus any transport or lifecycle error.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use mcpipe_client::McpClient;
    /// # use mcpipe_core::prelude::*;
    /// # async fn example(client: &McpClient) -> Result<()> {
    /// for resource in client.list_capabilities(CapabilityKind::Resources).await? {
    ///     println!("{} at {}", resource.name, resource.target());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn list_capabilities(&self, kind: CapabilityKind) -> Result<Vec<CapabilityDescriptor>> {
        self.list_raw(kind)
            .await?
            .into_iter()
            .map(|entry| CapabilityDescriptor::from_value(kind, entry))
            .collect()
    }

    async fn list_raw(&self, kind: CapabilityKind) -> Result<Vec<Value>> {
        let session = self.session().await?;
        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = Codec::to_params(&PaginationParams {
                cursor: cursor.take(),
            })?;
            let page = session.request(kind.list_method(), params).await?;
            let Value::Object(mut page) = page else {
                return Err(Error::schema(format!("{} result is not an object", kind.list_method())));
            };

            match page.remove(kind.items_field()) {
                Some(Value::Array(items)) => entries.extend(items),
                _ => {
                    return Err(Error::schema(format!(
                        "{} result has no \"{}\" array",
                        kind.list_method(),
                        kind.items_field()
                    )));
                }
            }

            match page.remove("nextCursor") {
                Some(Value::String(next)) if !next.is_empty() => {
                    if !seen.insert(next.clone()) {
                        warn!(%kind, cursor = %next, "server repeated a cursor, stopping");
                        break;
                    }
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        debug!(%kind, count = entries.len(), "listed capabilities");
        Ok(entries)
    }

    async fn list_typed<T: DeserializeOwned>(&self, kind: CapabilityKind) -> Result<Vec<T>> {
        self.list_raw(kind)
            .await?
            .into_iter()
            .map(|entry| {
                serde_json::from_value(entry)
                    .map_err(|e| Error::schema(format!("invalid {kind} entry: {e}")))
            })
            .collect()
    }

    /// Invoke one capability by name.
    ///
    /// | kind | request | result |
    /// |---|---|---|
    /// | tools | `tools/call {name, arguments}` | [`InvocationResult::Tool`] |
    /// | prompts | `prompts/get {name, arguments}` | [`InvocationResult::Prompt`] |
    /// | resources | `resources/read {uri: name}` | [`InvocationResult::Resource`] |
    ///
    /// `name` is not checked against any listing; the server decides. Prompt
    /// arguments that are not strings are sent as their JSON text, and
    /// resources ignore `arguments`.
    ///
    /// # Errors
    ///
    /// A tool result flagged `isError` becomes [`Error::Remote`] carrying the
    /// tool's text, with no code. Error responses become [`Error::Remote`]
    /// with their JSON-RPC code.
    pub async fn invoke(
        &self,
        kind: CapabilityKind,
        name: &str,
        arguments: Params,
    ) -> Result<InvocationResult> {
        match kind {
            CapabilityKind::Tools => self
                .call_tool(name, Some(arguments))
                .await
                .map(InvocationResult::Tool),
            CapabilityKind::Prompts => {
                let arguments = (!arguments.is_empty()).then(|| prompt_arguments(&arguments));
                self.get_prompt(name, arguments)
                    .await
                    .map(InvocationResult::Prompt)
            }
            CapabilityKind::Resources => {
                if !arguments.is_empty() {
                    debug!(uri = name, "resources/read takes no arguments, ignoring them");
                }
                self.read_resource(name)
                    .await
                    .map(InvocationResult::Resource)
            }
        }
    }

    /// List available tools
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        self.list_typed(CapabilityKind::Tools).await
    }

    /// Call a tool
    ///
    /// This method calls a specific tool by name with the given arguments.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the tool to call
    /// * `arguments` - Optional arguments to pass to the tool
    ///
    /// # Errors
    ///
    /// A result with `isError: true` is returned as [`Error::Remote`]; the
    /// full result is kept in [`RemoteError::data`].
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use mcpipe_client::McpClient;
    /// # use mcpipe_core::prelude::*;
    /// # use serde_json::json;
    /// # async fn example(client: &McpClient) -> Result<()> {
    /// let arguments = json!({"path": "test.md"}).as_object().cloned();
    /// let response = client.call_tool("read_file", arguments).await?;
    /// println!("{}", response.text());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<Params>,
    ) -> Result<ToolsCallResponse> {
        let request = ToolsCallRequest {
            name: name.into(),
            arguments,
        };
        let response: ToolsCallResponse = self
            .session()
            .await?
            .request_typed(CapabilityKind::Tools.invoke_method(), &request)
            .await?;

        if response.is_error() {
            debug!(tool = %request.name, "tool reported an error");
            let mut remote = RemoteError::tool(response.text());
            remote.data = serde_json::to_value(&response).ok();
            return Err(Error::Remote(remote));
        }
        Ok(response)
    }

    /// List available prompts
    pub async fn list_prompts(&self) -> Result<Vec<Prompt>> {
        self.list_typed(CapabilityKind::Prompts).await
    }

    /// Get a prompt, optionally filling in its arguments
    pub async fn get_prompt(
        &self,
        name: impl Into<String>,
        arguments: Option<PromptArguments>,
    ) -> Result<PromptsGetResponse> {
        let request = PromptsGetRequest {
            name: name.into(),
            arguments,
        };
        self.session()
            .await?
            .request_typed(CapabilityKind::Prompts.invoke_method(), &request)
            .await
    }

    /// List available resources
    pub async fn list_resources(&self) -> Result<Vec<Resource>> {
        self.list_typed(CapabilityKind::Resources).await
    }

    /// Read a resource by URI
    pub async fn read_resource(&self, uri: impl Into<String>) -> Result<ResourcesReadResponse> {
        let request = ResourcesReadRequest { uri: uri.into() };
        self.session()
            .await?
            .request_typed(CapabilityKind::Resources.invoke_method(), &request)
            .await
    }

    /// Check that the server is responsive
    pub async fn ping(&self) -> Result<()> {
        self.session().await?.request(methods::PING, None).await?;
        Ok(())
    }

    /// Identifiers of calls awaiting a response, oldest first
    pub async fn pending_requests(&self) -> Vec<RequestId> {
        match self.session().await {
            Ok(session) => session.pending_ids().await,
            Err(_) => Vec::new(),
        }
    }

    /// Cancel one in-flight call.
    ///
    /// The waiting caller gets [`Error::Cancelled`] and the server is sent
    /// `notifications/cancelled`; other calls and the connection are
    /// unaffected.
    pub async fn cancel_request(&self, id: &RequestId, reason: Option<String>) -> Result<()> {
        self.session().await?.cancel(id, reason).await
    }
}

/// Builder for configuring and creating MCP clients.
///
/// # Examples
///
/// ```rust,no_run
/// use mcpipe_client::McpClientBuilder;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> mcpipe_core::Result<()> {
/// let client = McpClientBuilder::new()
///     .with_info("weather-client", "1.0.0")
///     .with_request_timeout(Duration::from_secs(10))
///     .connect_stdio("python", &["weather_server.py"])
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct McpClientBuilder {
    config: ClientConfig,
}

impl McpClientBuilder {
    /// Create a new `McpClientBuilder` with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration, e.g. one loaded from a file
    pub fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Set the client information.
    ///
    /// This information is sent to the server during the handshake.
    ///
    /// ```rust
    /// use mcpipe_client::McpClientBuilder;
    ///
    /// let builder = McpClientBuilder::new().with_info("My Client", "1.0.0");
    /// ```
    pub fn with_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.client_info = Implementation {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    /// Deadline for each request; `None` waits forever
    pub fn with_request_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.config.request_timeout_ms = timeout
            .into()
            .map(|t| t.as_millis() as u64)
            .unwrap_or(0);
        self
    }

    /// Time the server gets to exit after its stdin closes before it is killed
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace_ms = grace.as_millis() as u64;
        self
    }

    /// Enable roots capability.
    ///
    /// # Arguments
    ///
    /// * `list_changed` - Whether the client will notify the server when its
    ///   roots change
    pub fn with_roots(mut self, list_changed: bool) -> Self {
        self.config.capabilities = self.config.capabilities.with_roots(list_changed);
        self
    }

    /// Announce an experimental capability.
    ///
    /// ```rust
    /// use mcpipe_client::McpClientBuilder;
    /// use serde_json::json;
    ///
    /// let builder = McpClientBuilder::new()
    ///     .with_experimental("new_feature".to_string(), json!({"enabled": true}));
    /// ```
    pub fn with_experimental(mut self, key: String, value: Value) -> Self {
        self.config.capabilities = self.config.capabilities.with_experimental(key, value);
        self
    }

    /// Server to launch with [`McpClient::connect_configured`]
    pub fn with_server(mut self, params: ServerParameters) -> Self {
        self.config.server = Some(params);
        self
    }

    /// Validate the configuration and create a disconnected client
    pub fn build(self) -> Result<McpClient> {
        self.config.validate()?;
        Ok(McpClient::new(self.config))
    }

    /// Build the client and connect it to a server launched via stdio.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration and for every reason
    /// [`McpClient::connect`] can fail.
    pub async fn connect_stdio(self, command: &str, args: &[&str]) -> Result<McpClient> {
        let client = self.build()?;
        client
            .connect(ServerParameters::new(command).with_args(args.iter().copied()))
            .await?;
        Ok(client)
    }
}

/// Prelude for MCP client development
pub mod prelude {
    pub use crate::{InvocationResult, McpClient, McpClientBuilder};
    pub use mcpipe_core::prelude::*;
}
