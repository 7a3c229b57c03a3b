//! In-memory simulation backend.
//!
//! `MockClient` implements the full client contract without file I/O or
//! subprocesses. Two hooks make it useful for testing:
//!
//! - **Artificial latency**: every operation awaits a configurable delay
//!   before doing any work, modelling the asynchronous nature of a real
//!   backend without depending on real I/O timing.
//! - **One-shot fault injection**: [`MockClient::inject_error`] arms the
//!   *next* invocation of a named operation to fail. The fault consumes
//!   itself, so a test can exercise an error branch and then continue with
//!   normal behaviour.

use std::time::Duration;

use async_trait::async_trait;

use crate::kicad::error::{ClientError, ClientResult};
use crate::kicad::types::{
    Board, Component, ComponentSpec, ConnectOptions, ExportRequest, ModelFormat, Project,
    RuleCheckResult, RuleViolation, DEFAULT_LAYERS, MAX_LAYERS, MIN_LAYERS,
};
use crate::kicad::KiCadClient;

/// Deterministic in-memory implementation of [`KiCadClient`].
#[derive(Debug)]
pub struct MockClient {
    connected: bool,
    current_project: Option<Project>,
    current_board: Option<Board>,
    components: Vec<Component>,
    /// Layer count remembered for the next board created.
    pending_layers: Option<u32>,
    simulate_delay: Duration,
    /// Name of the operation whose next invocation fails.
    pending_fault: Option<String>,
}

impl MockClient {
    /// Creates a disconnected mock client with the default 50 ms latency.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connected: false,
            current_project: None,
            current_board: None,
            components: Vec::new(),
            pending_layers: None,
            simulate_delay: Duration::from_millis(50),
            pending_fault: None,
        }
    }

    /// Sets the artificial latency awaited before every operation.
    pub fn set_simulate_delay(&mut self, delay: Duration) {
        self.simulate_delay = delay;
    }

    /// Arms the next invocation of `operation` to fail.
    ///
    /// Operation names are the trait method names (`"connect"`,
    /// `"create_project"`, ...). The fault fires exactly once and clears
    /// itself on consumption.
    pub fn inject_error(&mut self, operation: impl Into<String>) {
        self.pending_fault = Some(operation.into());
    }

    /// Consumes the pending fault if it targets `operation`.
    ///
    /// The check and the clear are a single step, so a fired fault can never
    /// be observed twice.
    fn take_fault(&mut self, operation: &str) -> bool {
        if self.pending_fault.as_deref() == Some(operation) {
            self.pending_fault = None;
            true
        } else {
            false
        }
    }

    fn ensure_connected(&self) -> ClientResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(ClientError::connection("Not connected to KiCad"))
        }
    }

    async fn delay(&self) {
        tokio::time::sleep(self.simulate_delay).await;
    }

    fn injected(operation: &str) -> ClientError {
        ClientError::operation(format!("Injected fault: {operation} failed"))
    }

    fn project_base_name(&self) -> &str {
        self.current_project
            .as_ref()
            .map_or("board", |p| p.name.as_str())
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KiCadClient for MockClient {
    async fn connect(&mut self, _options: Option<ConnectOptions>) -> ClientResult<()> {
        self.delay().await;
        if self.take_fault("connect") {
            return Err(ClientError::connection("Failed to connect to mock KiCad"));
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.delay().await;
        self.connected = false;
        self.current_project = None;
        self.current_board = None;
        self.components.clear();
        self.pending_layers = None;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn create_project(&mut self, name: &str, path: &str) -> ClientResult<Project> {
        self.ensure_connected()?;
        self.delay().await;

        if self.take_fault("create_project") {
            return Err(ClientError::project("Failed to create project"));
        }

        let pcb_path = format!("{path}/{name}.kicad_pcb");
        let project = Project {
            name: name.to_string(),
            path: path.to_string(),
            schematic_path: Some(format!("{path}/{name}.kicad_sch")),
            pcb_path: Some(pcb_path.clone()),
        };

        self.current_project = Some(project.clone());
        self.components.clear();
        self.current_board = Some(Board {
            path: pcb_path,
            layers: self.pending_layers.take().unwrap_or(DEFAULT_LAYERS),
            components: Vec::new(),
            nets: Vec::new(),
        });

        Ok(project)
    }

    async fn open_project(&mut self, path: &str) -> ClientResult<Project> {
        self.ensure_connected()?;
        self.delay().await;

        if self.take_fault("open_project") {
            return Err(ClientError::project(format!("Project not found: {path}")));
        }

        let name = path.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or("project");
        let project = Project {
            name: name.to_string(),
            path: path.to_string(),
            schematic_path: Some(format!("{path}/{name}.kicad_sch")),
            pcb_path: Some(format!("{path}/{name}.kicad_pcb")),
        };

        self.current_project = Some(project.clone());
        Ok(project)
    }

    async fn close_project(&mut self) -> ClientResult<()> {
        self.ensure_connected()?;
        self.delay().await;
        self.current_project = None;
        self.current_board = None;
        self.components.clear();
        Ok(())
    }

    async fn current_project(&mut self) -> ClientResult<Option<Project>> {
        self.ensure_connected()?;
        self.delay().await;
        Ok(self.current_project.clone())
    }

    async fn load_board(&mut self, path: &str) -> ClientResult<Board> {
        self.ensure_connected()?;
        self.delay().await;

        if self.take_fault("load_board") {
            return Err(ClientError::project(format!("Board not found: {path}")));
        }

        let board = Board {
            path: path.to_string(),
            layers: DEFAULT_LAYERS,
            components: self.components.clone(),
            nets: Vec::new(),
        };

        self.current_board = Some(board.clone());
        Ok(board)
    }

    async fn save_board(&mut self, path: &str) -> ClientResult<()> {
        self.ensure_connected()?;
        self.delay().await;

        let Some(board) = self.current_board.as_mut() else {
            return Err(ClientError::project("No board loaded"));
        };

        if self.pending_fault.as_deref() == Some("save_board") {
            self.pending_fault = None;
            return Err(ClientError::operation("Failed to save board"));
        }

        board.path = path.to_string();
        Ok(())
    }

    async fn components(&mut self) -> ClientResult<Vec<Component>> {
        self.ensure_connected()?;
        self.delay().await;
        if self.take_fault("components") {
            return Err(Self::injected("components"));
        }
        Ok(self.components.clone())
    }

    async fn add_component(&mut self, spec: ComponentSpec) -> ClientResult<Component> {
        self.ensure_connected()?;
        self.delay().await;

        if self.take_fault("add_component") {
            return Err(Self::injected("add_component"));
        }

        // References derive from the current list length, matching the live
        // toolchain's observed behaviour. Removal followed by re-addition can
        // therefore repeat a sequence position; uniqueness is only promised
        // among components added without interleaved removals.
        let reference = format!("U{}", self.components.len() + 1);
        let component = spec.into_component(reference);
        self.components.push(component.clone());
        Ok(component)
    }

    async fn remove_component(&mut self, reference: &str) -> ClientResult<()> {
        self.ensure_connected()?;
        self.delay().await;

        let Some(index) = self.components.iter().position(|c| c.reference == reference) else {
            return Err(ClientError::operation(format!(
                "Component not found: {reference}"
            )));
        };

        self.components.remove(index);
        Ok(())
    }

    async fn run_drc(&mut self) -> ClientResult<RuleCheckResult> {
        self.ensure_connected()?;
        self.delay().await;

        if self.take_fault("run_drc") {
            return Err(ClientError::operation("DRC check failed"));
        }

        let warnings = if self.components.is_empty() {
            vec![RuleViolation {
                kind: "NO_COMPONENTS".to_string(),
                message: "No components on board".to_string(),
                location: None,
            }]
        } else {
            Vec::new()
        };

        Ok(RuleCheckResult {
            passed: !self.components.is_empty(),
            errors: Vec::new(),
            warnings,
        })
    }

    async fn run_erc(&mut self) -> ClientResult<RuleCheckResult> {
        self.ensure_connected()?;
        self.delay().await;

        if self.take_fault("run_erc") {
            return Err(ClientError::operation("ERC check failed"));
        }

        Ok(RuleCheckResult {
            passed: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        })
    }

    async fn auto_route(&mut self) -> ClientResult<()> {
        self.ensure_connected()?;
        self.delay().await;

        if self.take_fault("auto_route") {
            return Err(Self::injected("auto_route"));
        }

        if self.components.is_empty() {
            return Err(ClientError::operation("No components to route"));
        }
        Ok(())
    }

    async fn export(&mut self, request: ExportRequest) -> ClientResult<Vec<String>> {
        self.ensure_connected()?;
        self.delay().await;

        if self.take_fault("export") {
            return Err(Self::injected("export"));
        }

        let base = self.project_base_name();
        let file = format!(
            "{}/{}.{}",
            request.output_dir,
            base,
            request.format.extension()
        );
        Ok(vec![file])
    }

    async fn generate_3d(
        &mut self,
        output_path: &str,
        format: ModelFormat,
    ) -> ClientResult<String> {
        self.ensure_connected()?;
        self.delay().await;

        if self.take_fault("generate_3d") {
            return Err(Self::injected("generate_3d"));
        }

        Ok(format!("{output_path}.{}", format.extension()))
    }

    async fn generate_bom(&mut self, output_path: &str) -> ClientResult<String> {
        self.ensure_connected()?;
        self.delay().await;

        if self.take_fault("generate_bom") {
            return Err(Self::injected("generate_bom"));
        }

        Ok(format!("{output_path}.csv"))
    }

    async fn set_layer_count(&mut self, layers: u32) -> ClientResult<()> {
        self.ensure_connected()?;
        self.delay().await;

        if !(MIN_LAYERS..=MAX_LAYERS).contains(&layers) {
            return Err(ClientError::operation(
                "Layer count must be between 1 and 32",
            ));
        }

        if let Some(board) = self.current_board.as_mut() {
            board.layers = layers;
        } else {
            self.pending_layers = Some(layers);
        }
        Ok(())
    }

    async fn set_board_size(&mut self, width: f64, height: f64) -> ClientResult<()> {
        self.ensure_connected()?;
        self.delay().await;

        if width <= 0.0 || height <= 0.0 {
            return Err(ClientError::operation("Board dimensions must be positive"));
        }

        // The mock validates but does not model board outlines; a real
        // backend would rewrite the edge cuts here.
        Ok(())
    }
}
