//! MCP stdio client.
//!
//! Speaks newline-delimited JSON-RPC 2.0 to an MCP server, normally a child
//! process such as `uvx mcp-neo4j-cypher`.

use super::protocol::*;
use super::session::{ToolOutput, ToolSession};
use crate::config::McpSettings;
use crate::error::{MarketlensError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const CLIENT_NAME: &str = "marketlens";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Grace period for the server to exit after stdin is closed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A JSON-RPC connection over a pair of byte streams.
pub struct McpConnection {
    writer: BoxedWriter,
    reader: Lines<BufReader<BoxedReader>>,
    next_id: u64,
}

impl McpConnection {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static, writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        let reader: BoxedReader = Box::new(reader);
        Self {
            writer: Box::new(writer),
            reader: BufReader::new(reader).lines(),
            next_id: 1,
        }
    }

    /// Send a request and wait for its response.
    pub async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        self.send(&JsonRpcRequest::request(id, method, params)).await?;

        loop {
            let line = self.reader.next_line().await?.ok_or_else(|| {
                MarketlensError::Protocol(format!(
                    "Server closed the connection while waiting for '{}'",
                    method
                ))
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let message: JsonRpcMessage = match serde_json::from_str(&line) {
                Ok(m) => m,
                Err(e) => {
                    debug!("Skipping non JSON-RPC line from server: {}", e);
                    continue;
                }
            };

            if message.is_response_to(id) {
                if let Some(error) = message.error {
                    return Err(MarketlensError::Rpc {
                        method: method.to_string(),
                        code: error.code,
                        message: error.message,
                    });
                }
                return Ok(message.result.unwrap_or(Value::Null));
            }

            match (message.method.as_deref(), message.id) {
                (Some(server_method), Some(request_id)) => {
                    self.answer_server_request(server_method, request_id).await?;
                }
                (Some(notification), None) => {
                    debug!("Server notification: {}", notification);
                }
                (None, other) => {
                    warn!("Ignoring response with unexpected id {:?}", other);
                }
            }
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        self.send(&JsonRpcRequest::notification(method, params)).await
    }

    async fn answer_server_request(&mut self, method: &str, id: Value) -> Result<()> {
        let response = match method {
            "ping" => JsonRpcResponse::success(id, json!({})),
            _ => JsonRpcResponse::error(id, -32601, &format!("Method not found: {}", method)),
        };
        self.send(&response).await
    }

    async fn send(&mut self, message: &impl serde::Serialize) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// An initialized MCP session: one connection, one server process.
pub struct McpSession {
    id: String,
    server_name: String,
    tools: Vec<ToolDescriptor>,
    connection: Mutex<Option<McpConnection>>,
    child: Option<Child>,
    closed: bool,
}

impl McpSession {
    /// Run the initialize handshake and tool discovery on a connection.
    pub async fn handshake(mut connection: McpConnection, child: Option<Child>) -> Result<Self> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: json!({}),
            client_info: ClientInfo {
                name: CLIENT_NAME.to_string(),
                version: CLIENT_VERSION.to_string(),
            },
        };

        let result = connection
            .request("initialize", Some(serde_json::to_value(params)?))
            .await?;
        let init: InitializeResult = serde_json::from_value(result)?;
        if init.protocol_version != PROTOCOL_VERSION {
            debug!(
                "Server negotiated protocol {} (client offered {})",
                init.protocol_version, PROTOCOL_VERSION
            );
        }
        connection.notify("notifications/initialized", None).await?;

        let tools = discover_tools(&mut connection).await?;
        let server_name = init
            .server_info
            .map(|s| s.name)
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            server_name,
            tools,
            connection: Mutex::new(Some(connection)),
            child,
            closed: false,
        })
    }

    /// Spawn the configured server process and complete the handshake
    /// within the configured timeout.
    pub async fn spawn(settings: &McpSettings) -> Result<Self> {
        let mut command = server_command(settings);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            MarketlensError::ToolUnavailable(format!(
                "Failed to start '{}': {}",
                settings.command, e
            ))
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill().await;
            return Err(MarketlensError::ToolUnavailable(
                "MCP server stdio was not captured".to_string(),
            ));
        };

        let connection = McpConnection::new(stdout, stdin);
        let timeout = settings.handshake_timeout();

        // The child moves into the session only once the handshake succeeds;
        // until then it is killed here on failure.
        match tokio::time::timeout(timeout, Self::handshake(connection, None)).await {
            Ok(Ok(mut session)) => {
                session.child = Some(child);
                info!(
                    "MCP session {} open ({} tools from '{}')",
                    session.id,
                    session.tools.len(),
                    session.server_name
                );
                Ok(session)
            }
            Ok(Err(e)) => {
                let _ = child.kill().await;
                Err(MarketlensError::ToolUnavailable(format!("MCP handshake failed: {}", e)))
            }
            Err(_) => {
                let _ = child.kill().await;
                Err(MarketlensError::ToolUnavailable(format!(
                    "MCP handshake timed out after {}s",
                    timeout.as_secs()
                )))
            }
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }
}

fn server_command(settings: &McpSettings) -> Command {
    let mut command = Command::new(&settings.command);
    command.args(&settings.args);
    if !settings.inherit_env {
        command.env_clear();
        for key in &settings.env_passthrough {
            if let Ok(value) = std::env::var(key) {
                command.env(key, value);
            }
        }
    }
    command.envs(&settings.env);
    command
}

async fn discover_tools(connection: &mut McpConnection) -> Result<Vec<ToolDescriptor>> {
    let mut tools = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
        let page: ToolsListResult =
            serde_json::from_value(connection.request("tools/list", params).await?)?;
        tools.extend(page.tools);

        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    Ok(tools)
}

#[async_trait]
impl ToolSession for McpSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<ToolOutput> {
        let mut guard = self.connection.lock().await;
        let connection = guard
            .as_mut()
            .ok_or_else(|| MarketlensError::Protocol("Session is closed".to_string()))?;

        let params = serde_json::to_value(ToolCallParams { name, arguments })?;
        let reply = match connection.request("tools/call", Some(params)).await {
            Ok(reply) => reply,
            // The server handled the call and refused it; the model gets to see why.
            Err(MarketlensError::Rpc { code, message, .. }) => {
                debug!("Tool '{}' rejected by server ({}): {}", name, code, message);
                return Ok(ToolOutput {
                    text: format!("{} (code {})", message, code),
                    is_error: true,
                });
            }
            Err(e) => return Err(e),
        };
        let result: ToolCallResult = serde_json::from_value(reply)?;

        Ok(ToolOutput {
            text: result.text(),
            is_error: result.is_error.unwrap_or(false),
        })
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        // Dropping the connection closes the server's stdin.
        self.connection.get_mut().take();

        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!("MCP server exited with {}", status),
                Ok(Err(e)) => warn!("Failed waiting for MCP server: {}", e),
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill MCP server: {}", e);
                    }
                }
            }
        }
        debug!("MCP session {} closed", self.id);
    }

    fn abort(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.connection.get_mut().take();
        if let Some(child) = self.child.as_mut() {
            if let Err(e) = child.start_kill() {
                warn!("Failed to kill MCP server: {}", e);
            }
        }
    }
}
