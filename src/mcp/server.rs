//! MCP server implementation for KiCad PCB design automation.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Initialisation**: Capability negotiation and version agreement
//! 2. **Operation**: Handling tool calls, resource reads and prompt requests
//! 3. **Shutdown**: Graceful connection termination
//!
//! The server owns one shared [`ClientBackend`], injected at construction.
//! Tool handlers lazily connect it before the first operation and keep the
//! session open across calls, so consecutive tools see the same current
//! project and board. Every tool response is a JSON envelope of the form
//! `{"success": ..., ..., "message": ...}` rendered as text content.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::kicad::types::{BoardLayer, Position};
use crate::kicad::{
    ClientBackend, ClientError, ComponentSpec, ExportFormat, ExportRequest, KiCadClient,
    ModelFormat,
};
use crate::mcp::protocol::{
    ErrorCode, IncomingMessage, JsonRpcError, JsonRpcErrorData, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, RequestId, MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::mcp::transport::StdioTransport;

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    pub tools: Value,
    /// Resource-related capabilities.
    pub resources: Value,
    /// Prompt-related capabilities.
    pub prompts: Value,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: json!({}),
            resources: json!({}),
            prompts: json!({}),
        }
    }
}

/// Server information for the initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// A tool definition for the tools/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Parameters for the tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if requires fn(&T) -> bool
const fn is_false(b: &bool) -> bool {
    !*b
}

impl ToolCallResult {
    /// Creates a successful result carrying a pretty-printed JSON envelope.
    #[must_use]
    pub fn envelope(value: &Value) -> Self {
        let text = serde_json::to_string_pretty(value)
            .unwrap_or_else(|_| value.to_string());
        Self {
            content: vec![ToolContent::Text { text }],
            is_error: false,
        }
    }

    /// Creates an error result from a client error, preserving its stable
    /// code so callers can distinguish error kinds.
    #[must_use]
    pub fn client_error(error: &ClientError) -> Self {
        let envelope = json!({
            "success": false,
            "code": error.code(),
            "message": error.to_string(),
        });
        let text = serde_json::to_string_pretty(&envelope)
            .unwrap_or_else(|_| envelope.to_string());
        Self {
            content: vec![ToolContent::Text { text }],
            is_error: true,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }
}

/// A resource definition for the resources/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    /// Resource URI.
    pub uri: String,
    /// Human-readable name.
    pub name: String,
    /// Description of the resource contents.
    pub description: String,
    /// MIME type of the resource contents.
    pub mime_type: String,
}

/// Parameters for the resources/read request.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceReadParams {
    /// URI of the resource to read.
    pub uri: String,
}

/// An argument accepted by a prompt.
#[derive(Debug, Clone, Serialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Argument description.
    pub description: String,
    /// Whether the argument must be supplied.
    pub required: bool,
}

/// A prompt definition for the prompts/list response.
#[derive(Debug, Clone, Serialize)]
pub struct PromptDefinition {
    /// Unique prompt name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Arguments the prompt accepts.
    pub arguments: Vec<PromptArgument>,
}

/// Parameters for the prompts/get request.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptGetParams {
    /// Name of the prompt.
    pub name: String,
    /// Prompt arguments.
    #[serde(default)]
    pub arguments: Value,
}

// Tool argument structures. All tools accept camelCase keys, matching the
// JSON schemas advertised in tools/list.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateProjectArgs {
    name: String,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenProjectArgs {
    path: String,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectScopedArgs {
    #[serde(default)]
    project: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddComponentArgs {
    value: String,
    footprint: String,
    x: f64,
    y: f64,
    #[serde(default)]
    rotation: f64,
    #[serde(default)]
    layer: BoardLayer,
    #[serde(default)]
    project: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoveComponentArgs {
    reference: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportArgs {
    format: ExportFormat,
    output_dir: String,
    #[serde(default)]
    layers: Option<Vec<String>>,
    #[serde(default)]
    project: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BomArgs {
    output_path: String,
    #[serde(default)]
    project: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Generate3dArgs {
    output_path: String,
    #[serde(default)]
    format: Option<ModelFormat>,
    #[serde(default)]
    project: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SetLayerCountArgs {
    layers: u32,
}

#[derive(Debug, Deserialize)]
struct SetBoardSizeArgs {
    width: f64,
    height: f64,
}

/// The MCP server for KiCad PCB design automation.
pub struct McpServer {
    /// Current server state.
    state: ServerState,
    /// The transport layer.
    transport: StdioTransport,
    /// Negotiated protocol version (set after initialisation).
    protocol_version: Option<String>,
    /// The shared KiCad client backend.
    client: ClientBackend,
}

impl McpServer {
    /// Creates a new MCP server around the given client backend.
    #[must_use]
    pub fn new(client: ClientBackend) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            transport: StdioTransport::new(),
            protocol_version: None,
            client,
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Returns the negotiated protocol version, once initialised.
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Runs the MCP server main loop with graceful shutdown handling.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run(&mut self) -> std::io::Result<()> {
        self.run_with_shutdown().await
    }

    /// Runs the main loop and handles shutdown.
    #[cfg(unix)]
    async fn run_with_shutdown(&mut self) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(std::io::Error::other)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(std::io::Error::other)?;

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line_result = self.transport.read_line() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Runs the main loop and handles shutdown.
    #[cfg(windows)]
    async fn run_with_shutdown(&mut self) -> std::io::Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line_result = self.transport.read_line() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Handles the result from transport read.
    ///
    /// Returns `true` if the server should shut down.
    async fn handle_transport_result(
        &mut self,
        line_result: std::io::Result<Option<String>>,
    ) -> std::io::Result<bool> {
        let Some(line) = line_result? else {
            self.state = ServerState::ShuttingDown;
            return Ok(true);
        };

        if line.trim().is_empty() {
            return Ok(false);
        }

        self.handle_line(&line).await?;

        if self.state == ServerState::ShuttingDown {
            return Ok(true);
        }

        Ok(false)
    }

    /// Handles a single line of input.
    async fn handle_line(&mut self, line: &str) -> std::io::Result<()> {
        use crate::mcp::protocol::parse_message;

        match parse_message(line) {
            Ok(msg) => self.handle_message(msg).await,
            Err(error) => {
                self.transport.write_error(&error).await?;
                Ok(())
            }
        }
    }

    /// Handles a parsed incoming message.
    async fn handle_message(&mut self, msg: IncomingMessage) -> std::io::Result<()> {
        match msg {
            IncomingMessage::Request(req) => self.handle_request(req).await,
            IncomingMessage::Notification(ref notif) => {
                self.handle_notification(notif);
                Ok(())
            }
        }
    }

    /// Handles an incoming request.
    async fn handle_request(&mut self, req: JsonRpcRequest) -> std::io::Result<()> {
        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(&req),
            "tools/list" => self.handle_tools_list(&req),
            "tools/call" => self.handle_tools_call(&req).await,
            "resources/list" => self.handle_resources_list(&req),
            "resources/read" => self.handle_resources_read(&req).await,
            "prompts/list" => self.handle_prompts_list(&req),
            "prompts/get" => self.handle_prompts_get(&req),
            "ping" => Ok(Self::handle_ping(&req)),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        };

        match response {
            Ok(resp) => self.transport.write_response(&resp).await,
            Err(error) => self.transport.write_error(&error).await,
        }
    }

    /// Handles an incoming notification.
    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        if notif.method == "notifications/initialized" && self.state == ServerState::Initialising {
            self.state = ServerState::Running;
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        if self.state != ServerState::AwaitingInit {
            return Err(JsonRpcError::new(
                Some(req.id.clone()),
                JsonRpcErrorData::with_message(
                    ErrorCode::InvalidRequest,
                    "Server already initialised",
                ),
            ));
        }

        if req.params.is_none() {
            return Err(JsonRpcError::invalid_params(
                req.id.clone(),
                "Missing initialize params",
            ));
        }

        let negotiated_version = MCP_PROTOCOL_VERSION.to_string();
        self.protocol_version = Some(negotiated_version.clone());
        self.state = ServerState::Initialising;

        let result = json!({
            "protocolVersion": negotiated_version,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": ServerInfo::default(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the ping request.
    fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), json!({}))
    }

    /// Ensures the server is in the Running state.
    fn require_running(&self, id: &RequestId) -> Result<(), JsonRpcError> {
        if self.state != ServerState::Running {
            return Err(JsonRpcError::new(
                Some(id.clone()),
                JsonRpcErrorData::with_message(ErrorCode::InvalidRequest, "Server not initialised"),
            ));
        }
        Ok(())
    }

    /// Lazily connects the shared client, mirroring a per-process session.
    async fn ensure_client_connected(&mut self) -> Result<(), ClientError> {
        if self.client.is_connected() {
            return Ok(());
        }
        self.client.connect(None).await
    }

    /// Opens the given project first when a tool was scoped to one.
    async fn open_if_requested(&mut self, project: Option<&str>) -> Result<(), ClientError> {
        if let Some(path) = project {
            self.client.open_project(path).await?;
        }
        Ok(())
    }

    // =========================================================================
    // tools
    // =========================================================================

    /// Handles the tools/list request.
    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let result = json!({
            "tools": Self::tool_definitions(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the tools/call request.
    async fn handle_tools_call(
        &mut self,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let params: ToolCallParams = req
            .params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
            .transpose()
            .map_err(|e| {
                JsonRpcError::invalid_params(
                    req.id.clone(),
                    format!("Invalid tool call params: {e}"),
                )
            })?
            .ok_or_else(|| {
                JsonRpcError::invalid_params(req.id.clone(), "Missing tool call params")
            })?;

        // A client may omit "arguments" entirely; treat that as empty.
        let arguments = if params.arguments.is_null() {
            json!({})
        } else {
            params.arguments
        };
        let result = self.dispatch_tool(&params.name, &arguments).await;

        let result_value = serde_json::to_value(&result).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            JsonRpcError::internal_error(req.id.clone(), "Failed to serialise result")
        })?;

        Ok(JsonRpcResponse::success(req.id.clone(), result_value))
    }

    /// Routes a tool call to its handler.
    async fn dispatch_tool(&mut self, name: &str, arguments: &Value) -> ToolCallResult {
        match name {
            "kicad_create_project" => self.call_create_project(arguments).await,
            "kicad_open_project" => self.call_open_project(arguments).await,
            "kicad_close_project" => self.call_close_project().await,
            "kicad_get_components" => self.call_get_components(arguments).await,
            "kicad_add_component" => self.call_add_component(arguments).await,
            "kicad_remove_component" => self.call_remove_component(arguments).await,
            "kicad_run_drc" => self.call_run_rule_check(arguments, true).await,
            "kicad_run_erc" => self.call_run_rule_check(arguments, false).await,
            "kicad_export" => self.call_export(arguments).await,
            "kicad_generate_bom" => self.call_generate_bom(arguments).await,
            "kicad_generate_3d" => self.call_generate_3d(arguments).await,
            "kicad_auto_route" => self.call_auto_route(arguments).await,
            "kicad_set_layer_count" => self.call_set_layer_count(arguments).await,
            "kicad_set_board_size" => self.call_set_board_size(arguments).await,
            _ => ToolCallResult::error(format!("Unknown tool: {name}")),
        }
    }

    async fn call_create_project(&mut self, arguments: &Value) -> ToolCallResult {
        let args: CreateProjectArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };

        let outcome = async {
            self.ensure_client_connected().await?;
            let path = args
                .path
                .unwrap_or_else(|| format!("./{}", args.name));
            self.client.create_project(&args.name, &path).await
        }
        .await;

        match outcome {
            Ok(project) => ToolCallResult::envelope(&json!({
                "success": true,
                "project": project,
                "message": format!("Successfully created project \"{}\"", project.name),
            })),
            Err(e) => ToolCallResult::client_error(&e),
        }
    }

    async fn call_open_project(&mut self, arguments: &Value) -> ToolCallResult {
        let args: OpenProjectArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };

        let outcome = async {
            self.ensure_client_connected().await?;
            self.client.open_project(&args.path).await
        }
        .await;

        match outcome {
            Ok(project) => ToolCallResult::envelope(&json!({
                "success": true,
                "project": project,
                "message": format!("Successfully opened project \"{}\"", project.name),
            })),
            Err(e) => ToolCallResult::client_error(&e),
        }
    }

    async fn call_close_project(&mut self) -> ToolCallResult {
        let outcome = async {
            self.ensure_client_connected().await?;
            self.client.close_project().await
        }
        .await;

        match outcome {
            Ok(()) => ToolCallResult::envelope(&json!({
                "success": true,
                "message": "Project closed",
            })),
            Err(e) => ToolCallResult::client_error(&e),
        }
    }

    async fn call_get_components(&mut self, arguments: &Value) -> ToolCallResult {
        let args: ProjectScopedArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };

        let outcome = async {
            self.ensure_client_connected().await?;
            self.open_if_requested(args.project.as_deref()).await?;
            self.client.components().await
        }
        .await;

        match outcome {
            Ok(components) => ToolCallResult::envelope(&json!({
                "success": true,
                "count": components.len(),
                "components": components,
                "message": format!("Found {} component(s)", components.len()),
            })),
            Err(e) => ToolCallResult::client_error(&e),
        }
    }

    async fn call_add_component(&mut self, arguments: &Value) -> ToolCallResult {
        let args: AddComponentArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };

        let spec = ComponentSpec {
            value: args.value,
            footprint: args.footprint,
            position: Position {
                x: args.x,
                y: args.y,
            },
            rotation: args.rotation,
            layer: args.layer,
        };

        let outcome = async {
            self.ensure_client_connected().await?;
            self.open_if_requested(args.project.as_deref()).await?;
            self.client.add_component(spec).await
        }
        .await;

        match outcome {
            Ok(component) => ToolCallResult::envelope(&json!({
                "success": true,
                "component": component,
                "message": format!(
                    "Successfully added component {} ({})",
                    component.reference, component.value
                ),
            })),
            Err(e) => ToolCallResult::client_error(&e),
        }
    }

    async fn call_remove_component(&mut self, arguments: &Value) -> ToolCallResult {
        let args: RemoveComponentArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };

        let outcome = async {
            self.ensure_client_connected().await?;
            self.client.remove_component(&args.reference).await
        }
        .await;

        match outcome {
            Ok(()) => ToolCallResult::envelope(&json!({
                "success": true,
                "message": format!("Removed component {}", args.reference),
            })),
            Err(e) => ToolCallResult::client_error(&e),
        }
    }

    /// Shared handler for DRC and ERC: same envelope, different key.
    async fn call_run_rule_check(&mut self, arguments: &Value, drc: bool) -> ToolCallResult {
        let args: ProjectScopedArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };

        let outcome = async {
            self.ensure_client_connected().await?;
            self.open_if_requested(args.project.as_deref()).await?;
            if drc {
                self.client.run_drc().await
            } else {
                self.client.run_erc().await
            }
        }
        .await;

        let label = if drc { "DRC" } else { "ERC" };
        match outcome {
            Ok(result) => {
                let message = if result.passed {
                    format!("{label} check passed successfully!")
                } else {
                    format!(
                        "{label} check failed with {} error(s) and {} warning(s)",
                        result.errors.len(),
                        result.warnings.len()
                    )
                };
                let key = if drc { "drc" } else { "erc" };
                ToolCallResult::envelope(&json!({
                    "success": true,
                    key: {
                        "passed": result.passed,
                        "errorCount": result.errors.len(),
                        "warningCount": result.warnings.len(),
                        "errors": result.errors,
                        "warnings": result.warnings,
                    },
                    "message": message,
                }))
            }
            Err(e) => ToolCallResult::client_error(&e),
        }
    }

    async fn call_export(&mut self, arguments: &Value) -> ToolCallResult {
        let args: ExportArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };

        let request = ExportRequest {
            output_dir: args.output_dir.clone(),
            format: args.format,
            layers: args.layers,
        };

        let outcome = async {
            self.ensure_client_connected().await?;
            self.open_if_requested(args.project.as_deref()).await?;
            self.client.export(request).await
        }
        .await;

        match outcome {
            Ok(files) => ToolCallResult::envelope(&json!({
                "success": true,
                "format": args.format,
                "outputDir": args.output_dir,
                "files": files,
                "message": format!(
                    "Successfully exported {} file(s) in {} format",
                    files.len(),
                    args.format
                ),
            })),
            Err(e) => ToolCallResult::client_error(&e),
        }
    }

    async fn call_generate_bom(&mut self, arguments: &Value) -> ToolCallResult {
        let args: BomArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };

        let outcome = async {
            self.ensure_client_connected().await?;
            self.open_if_requested(args.project.as_deref()).await?;
            self.client.generate_bom(&args.output_path).await
        }
        .await;

        match outcome {
            Ok(path) => ToolCallResult::envelope(&json!({
                "success": true,
                "outputPath": path,
                "message": format!("Successfully generated BOM at {path}"),
            })),
            Err(e) => ToolCallResult::client_error(&e),
        }
    }

    async fn call_generate_3d(&mut self, arguments: &Value) -> ToolCallResult {
        let args: Generate3dArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };

        let format = args.format.unwrap_or(ModelFormat::Step);
        let outcome = async {
            self.ensure_client_connected().await?;
            self.open_if_requested(args.project.as_deref()).await?;
            self.client.generate_3d(&args.output_path, format).await
        }
        .await;

        match outcome {
            Ok(path) => ToolCallResult::envelope(&json!({
                "success": true,
                "format": format,
                "outputPath": path,
                "message": format!("Successfully generated 3D model at {path}"),
            })),
            Err(e) => ToolCallResult::client_error(&e),
        }
    }

    async fn call_auto_route(&mut self, arguments: &Value) -> ToolCallResult {
        let args: ProjectScopedArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };

        let outcome = async {
            self.ensure_client_connected().await?;
            self.open_if_requested(args.project.as_deref()).await?;
            self.client.auto_route().await
        }
        .await;

        match outcome {
            Ok(()) => ToolCallResult::envelope(&json!({
                "success": true,
                "message": "Auto-routing completed",
            })),
            Err(e) => ToolCallResult::client_error(&e),
        }
    }

    async fn call_set_layer_count(&mut self, arguments: &Value) -> ToolCallResult {
        let args: SetLayerCountArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };

        let outcome = async {
            self.ensure_client_connected().await?;
            self.client.set_layer_count(args.layers).await
        }
        .await;

        match outcome {
            Ok(()) => ToolCallResult::envelope(&json!({
                "success": true,
                "layers": args.layers,
                "message": format!("Layer count set to {}", args.layers),
            })),
            Err(e) => ToolCallResult::client_error(&e),
        }
    }

    async fn call_set_board_size(&mut self, arguments: &Value) -> ToolCallResult {
        let args: SetBoardSizeArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };

        let outcome = async {
            self.ensure_client_connected().await?;
            self.client.set_board_size(args.width, args.height).await
        }
        .await;

        match outcome {
            Ok(()) => ToolCallResult::envelope(&json!({
                "success": true,
                "width": args.width,
                "height": args.height,
                "message": format!("Board size set to {} x {} mm", args.width, args.height),
            })),
            Err(e) => ToolCallResult::client_error(&e),
        }
    }

    /// Returns the list of available tools.
    #[allow(clippy::too_many_lines)]
    fn tool_definitions() -> Vec<ToolDefinition> {
        let project_arg = json!({
            "type": "string",
            "description": "Project path (uses current project if not specified)"
        });

        vec![
            ToolDefinition {
                name: "kicad_create_project".to_string(),
                description: "Create a new KiCad project with schematic and PCB files"
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "Project name" },
                        "path": {
                            "type": "string",
                            "description": "Project path (defaults to ./<name>)"
                        }
                    },
                    "required": ["name"]
                }),
            },
            ToolDefinition {
                name: "kicad_open_project".to_string(),
                description: "Open an existing KiCad project".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Path to the KiCad project file (.kicad_pro)"
                        }
                    },
                    "required": ["path"]
                }),
            },
            ToolDefinition {
                name: "kicad_close_project".to_string(),
                description: "Close the currently open project".to_string(),
                input_schema: json!({ "type": "object", "properties": {} }),
            },
            ToolDefinition {
                name: "kicad_get_components".to_string(),
                description: "Get all components from the current PCB".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": { "project": project_arg }
                }),
            },
            ToolDefinition {
                name: "kicad_add_component".to_string(),
                description: "Add a component to the PCB; the reference designator is \
                              assigned automatically"
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "value": { "type": "string", "description": "Component value" },
                        "footprint": { "type": "string", "description": "Footprint name" },
                        "x": { "type": "number", "description": "X position in mm" },
                        "y": { "type": "number", "description": "Y position in mm" },
                        "rotation": {
                            "type": "number",
                            "description": "Rotation in degrees (default 0)"
                        },
                        "layer": {
                            "type": "string",
                            "enum": ["front", "back"],
                            "description": "Board layer (default front)"
                        },
                        "project": project_arg
                    },
                    "required": ["value", "footprint", "x", "y"]
                }),
            },
            ToolDefinition {
                name: "kicad_remove_component".to_string(),
                description: "Remove a component from the PCB by reference".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "reference": {
                            "type": "string",
                            "description": "Component reference (e.g., U1)"
                        }
                    },
                    "required": ["reference"]
                }),
            },
            ToolDefinition {
                name: "kicad_run_drc".to_string(),
                description: "Run Design Rule Check (DRC) on the current PCB".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": { "project": project_arg }
                }),
            },
            ToolDefinition {
                name: "kicad_run_erc".to_string(),
                description: "Run Electrical Rule Check (ERC) on the schematic".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": { "project": project_arg }
                }),
            },
            ToolDefinition {
                name: "kicad_export".to_string(),
                description: "Export PCB to various formats (gerber, drill, pdf, svg, step, vrml)"
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "format": {
                            "type": "string",
                            "enum": ["gerber", "drill", "pdf", "svg", "step", "vrml"],
                            "description": "Export format"
                        },
                        "outputDir": {
                            "type": "string",
                            "description": "Output directory for exported files"
                        },
                        "layers": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Optional subset of layers to export"
                        },
                        "project": project_arg
                    },
                    "required": ["format", "outputDir"]
                }),
            },
            ToolDefinition {
                name: "kicad_generate_bom".to_string(),
                description: "Generate Bill of Materials (BOM) for the project".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "outputPath": {
                            "type": "string",
                            "description": "Output path for the BOM file"
                        },
                        "project": project_arg
                    },
                    "required": ["outputPath"]
                }),
            },
            ToolDefinition {
                name: "kicad_generate_3d".to_string(),
                description: "Generate a 3D model of the PCB".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "outputPath": {
                            "type": "string",
                            "description": "Output path for the 3D model"
                        },
                        "format": {
                            "type": "string",
                            "enum": ["step", "vrml"],
                            "description": "3D model format (default step)"
                        },
                        "project": project_arg
                    },
                    "required": ["outputPath"]
                }),
            },
            ToolDefinition {
                name: "kicad_auto_route".to_string(),
                description: "Automatically route PCB traces".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": { "project": project_arg }
                }),
            },
            ToolDefinition {
                name: "kicad_set_layer_count".to_string(),
                description: "Set the number of copper layers for the PCB (1-32)".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "layers": {
                            "type": "integer",
                            "description": "Layer count, between 1 and 32"
                        }
                    },
                    "required": ["layers"]
                }),
            },
            ToolDefinition {
                name: "kicad_set_board_size".to_string(),
                description: "Set the board dimensions in millimetres".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "width": { "type": "number", "description": "Board width in mm" },
                        "height": { "type": "number", "description": "Board height in mm" }
                    },
                    "required": ["width", "height"]
                }),
            },
        ]
    }

    // =========================================================================
    // resources
    // =========================================================================

    /// Handles the resources/list request.
    fn handle_resources_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let resources = vec![
            ResourceDefinition {
                uri: "kicad://project/current".to_string(),
                name: "Current KiCad Project".to_string(),
                description: "Information about the currently open KiCad project".to_string(),
                mime_type: "application/json".to_string(),
            },
            ResourceDefinition {
                uri: "kicad://components".to_string(),
                name: "PCB Components List".to_string(),
                description: "List of all components in the current PCB".to_string(),
                mime_type: "application/json".to_string(),
            },
        ];

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "resources": resources }),
        ))
    }

    /// Handles the resources/read request.
    ///
    /// Besides the two listed resources, `kicad://component/{reference}`
    /// resolves a single component by its reference designator.
    async fn handle_resources_read(
        &mut self,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let params: ResourceReadParams = req
            .params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
            .transpose()
            .map_err(|e| {
                JsonRpcError::invalid_params(req.id.clone(), format!("Invalid params: {e}"))
            })?
            .ok_or_else(|| {
                JsonRpcError::invalid_params(req.id.clone(), "Missing resource read params")
            })?;

        let document = match params.uri.as_str() {
            "kicad://project/current" => self.read_current_project().await,
            "kicad://components" => self.read_components().await,
            uri => {
                if let Some(reference) = uri.strip_prefix("kicad://component/") {
                    self.read_component(reference).await
                } else {
                    return Err(JsonRpcError::invalid_params(
                        req.id.clone(),
                        format!("Unknown resource: {uri}"),
                    ));
                }
            }
        };

        let text = serde_json::to_string_pretty(&document)
            .map_err(|e| JsonRpcError::internal_error(req.id.clone(), e.to_string()))?;

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({
                "contents": [{
                    "uri": params.uri,
                    "mimeType": "application/json",
                    "text": text,
                }]
            }),
        ))
    }

    async fn read_current_project(&mut self) -> Value {
        let outcome = async {
            self.ensure_client_connected().await?;
            self.client.current_project().await
        }
        .await;

        match outcome {
            Ok(Some(project)) => json!(project),
            Ok(None) => json!({ "error": "No project currently open" }),
            Err(e) => json!({ "error": e.to_string() }),
        }
    }

    async fn read_components(&mut self) -> Value {
        let outcome = async {
            self.ensure_client_connected().await?;
            self.client.components().await
        }
        .await;

        match outcome {
            Ok(components) => json!({
                "count": components.len(),
                "components": components,
            }),
            Err(e) => json!({
                "error": e.to_string(),
                "count": 0,
                "components": [],
            }),
        }
    }

    async fn read_component(&mut self, reference: &str) -> Value {
        let outcome = async {
            self.ensure_client_connected().await?;
            self.client.components().await
        }
        .await;

        match outcome {
            Ok(components) => components
                .into_iter()
                .find(|c| c.reference == reference)
                .map_or_else(
                    || json!({ "error": format!("Component {reference} not found") }),
                    |component| json!(component),
                ),
            Err(e) => json!({ "error": e.to_string() }),
        }
    }

    // =========================================================================
    // prompts
    // =========================================================================

    /// Handles the prompts/list request.
    fn handle_prompts_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "prompts": Self::prompt_definitions() }),
        ))
    }

    /// Handles the prompts/get request.
    fn handle_prompts_get(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let params: PromptGetParams = req
            .params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
            .transpose()
            .map_err(|e| {
                JsonRpcError::invalid_params(req.id.clone(), format!("Invalid params: {e}"))
            })?
            .ok_or_else(|| {
                JsonRpcError::invalid_params(req.id.clone(), "Missing prompt params")
            })?;

        let arg = |name: &str| -> Option<String> {
            params
                .arguments
                .get(name)
                .and_then(Value::as_str)
                .map(ToString::to_string)
        };

        let (description, text) = match params.name.as_str() {
            "pcb_design_help" => {
                let task = arg("task").unwrap_or_else(|| "your PCB design task".to_string());
                (
                    "Get help with PCB design tasks",
                    format!(
                        "I'll help you with: {task}\n\n\
                         Available KiCad automation: project initialisation, component \
                         placement, DRC/ERC checks, export to fabrication formats, BOM \
                         generation, 3D models and auto-routing.\n\n\
                         What specific assistance do you need?"
                    ),
                )
            }
            "analyze_design_rules" => {
                let scope = arg("projectPath").map_or_else(
                    || "the current project".to_string(),
                    |p| format!("the project at {p}"),
                );
                (
                    "Analyze and fix design rule violations",
                    format!(
                        "I'll analyse the design rules for {scope}.\n\n\
                         I will run DRC to identify layout issues, run ERC to identify \
                         schematic issues, and suggest fixes for any errors or warnings \
                         found.\n\nWould you like me to proceed?"
                    ),
                )
            }
            "prepare_manufacturing" => {
                let target = arg("manufacturer")
                    .map_or_else(String::new, |m| format!(" for {m}"));
                (
                    "Prepare PCB files for manufacturing",
                    format!(
                        "I'll help you prepare manufacturing files{target}.\n\n\
                         I can generate Gerber files, drill files, a CSV bill of \
                         materials, and STEP/VRML 3D models for mechanical \
                         verification.\n\nWhich files do you need?"
                    ),
                )
            }
            other => {
                return Err(JsonRpcError::invalid_params(
                    req.id.clone(),
                    format!("Unknown prompt: {other}"),
                ));
            }
        };

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({
                "description": description,
                "messages": [{
                    "role": "user",
                    "content": { "type": "text", "text": text }
                }]
            }),
        ))
    }

    /// Returns the list of available prompts.
    fn prompt_definitions() -> Vec<PromptDefinition> {
        vec![
            PromptDefinition {
                name: "pcb_design_help".to_string(),
                description: "Get help with PCB design tasks".to_string(),
                arguments: vec![PromptArgument {
                    name: "task".to_string(),
                    description: "The PCB design task you need help with".to_string(),
                    required: true,
                }],
            },
            PromptDefinition {
                name: "analyze_design_rules".to_string(),
                description: "Analyze and fix design rule violations".to_string(),
                arguments: vec![PromptArgument {
                    name: "projectPath".to_string(),
                    description: "Path to the KiCad project".to_string(),
                    required: false,
                }],
            },
            PromptDefinition {
                name: "prepare_manufacturing".to_string(),
                description: "Prepare PCB files for manufacturing".to_string(),
                arguments: vec![PromptArgument {
                    name: "manufacturer".to_string(),
                    description: "Target manufacturer (e.g., JLCPCB, PCBWay)".to_string(),
                    required: false,
                }],
            },
        ]
    }
}

/// Deserialises tool arguments, converting failures into tool error results.
fn parse_args<T: serde::de::DeserializeOwned>(arguments: &Value) -> Result<T, ToolCallResult> {
    serde_json::from_value(arguments.clone())
        .map_err(|e| ToolCallResult::error(format!("Invalid arguments: {e}")))
}
