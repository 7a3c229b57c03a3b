//! The client contract every backend must satisfy, and backend selection.
//!
//! [`KiCadClient`] defines the full operation set purely in terms of the
//! domain model and the error taxonomy. Which implementation backs it is a
//! construction-time decision made from configuration; callers never inspect
//! the concrete type at runtime.
//!
//! # Session state machine
//!
//! ```text
//! disconnected ──connect()──▶ connected ──create/open_project()──▶ project open
//!      ▲                          │                                    │
//!      └───────disconnect()───────┴────────────────────────────────────┘
//! ```
//!
//! Every operation except `connect`, `disconnect` and `is_connected` must,
//! as its first action, verify the session is connected and fail fast with a
//! [`Connection`](crate::kicad::ClientError::Connection) error otherwise.
//! `disconnect` tears down all session state unconditionally and never fails.

use async_trait::async_trait;

use crate::config::{BackendKind, Config};
use crate::kicad::bridge::BridgeClient;
use crate::kicad::mock::MockClient;
use crate::kicad::types::{
    Board, Component, ComponentSpec, ConnectOptions, ExportRequest, ModelFormat, Project,
    RuleCheckResult,
};
use crate::kicad::ClientResult;

/// Operations exposed by every KiCad backend.
#[async_trait]
pub trait KiCadClient {
    /// Establishes the session.
    async fn connect(&mut self, options: Option<ConnectOptions>) -> ClientResult<()>;

    /// Tears down all session state. Never fails; idempotent.
    async fn disconnect(&mut self);

    /// Pure, side-effect-free connectivity predicate.
    fn is_connected(&self) -> bool;

    /// Creates a new project, replacing the current one. A fresh empty board
    /// is created with it.
    async fn create_project(&mut self, name: &str, path: &str) -> ClientResult<Project>;

    /// Opens an existing project; the name is derived from the final path
    /// segment.
    async fn open_project(&mut self, path: &str) -> ClientResult<Project>;

    /// Clears the current project, board and component list. Idempotent.
    async fn close_project(&mut self) -> ClientResult<()>;

    /// Returns the current project, if any. Never fails once connected.
    async fn current_project(&mut self) -> ClientResult<Option<Project>>;

    /// Loads a board from the given path.
    async fn load_board(&mut self, path: &str) -> ClientResult<Board>;

    /// Saves the current board to the given path. Fails with a
    /// [`Project`](crate::kicad::ClientError::Project) error if no board is
    /// loaded.
    async fn save_board(&mut self, path: &str) -> ClientResult<()>;

    /// Returns a snapshot of the components on the current board.
    async fn components(&mut self) -> ClientResult<Vec<Component>>;

    /// Adds a component; the backend assigns the reference.
    async fn add_component(&mut self, spec: ComponentSpec) -> ClientResult<Component>;

    /// Removes the component with the given reference. Fails with an
    /// [`Operation`](crate::kicad::ClientError::Operation) error if the
    /// reference does not exist on the current board.
    async fn remove_component(&mut self, reference: &str) -> ClientResult<()>;

    /// Runs a Design Rule Check. Does not mutate session state.
    async fn run_drc(&mut self) -> ClientResult<RuleCheckResult>;

    /// Runs an Electrical Rule Check. Does not mutate session state.
    async fn run_erc(&mut self) -> ClientResult<RuleCheckResult>;

    /// Auto-routes traces. Fails with an Operation error when the board has
    /// zero components.
    async fn auto_route(&mut self) -> ClientResult<()>;

    /// Exports the board, returning one output path per requested format.
    async fn export(&mut self, request: ExportRequest) -> ClientResult<Vec<String>>;

    /// Generates a 3D model, returning the output path with the correct
    /// extension for the format.
    async fn generate_3d(&mut self, output_path: &str, format: ModelFormat)
        -> ClientResult<String>;

    /// Generates a bill of materials, returning the output path.
    async fn generate_bom(&mut self, output_path: &str) -> ClientResult<String>;

    /// Sets the copper layer count. Fails with an Operation error outside
    /// `1..=32`; applies to the current board, or is remembered for the next
    /// board created.
    async fn set_layer_count(&mut self, layers: u32) -> ClientResult<()>;

    /// Sets the board dimensions in mm. Fails with an Operation error if
    /// either dimension is not positive.
    async fn set_board_size(&mut self, width: f64, height: f64) -> ClientResult<()>;
}

/// The configured client backend: one variant per implementation, selected
/// once at construction time.
#[derive(Debug)]
pub enum ClientBackend {
    /// In-memory simulation backend.
    Mock(MockClient),
    /// Subprocess-orchestrating backend.
    Bridge(BridgeClient),
}

impl ClientBackend {
    /// Constructs the backend selected by the configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        match config.backend {
            BackendKind::Mock => {
                let mut client = MockClient::new();
                client.set_simulate_delay(std::time::Duration::from_millis(
                    config.mock.simulate_delay_ms,
                ));
                Self::Mock(client)
            }
            BackendKind::Bridge => Self::Bridge(BridgeClient::new(
                &config.bridge.python,
                &config.bridge.script,
                &config.bridge.kicad_cli,
            )),
        }
    }
}

macro_rules! delegate {
    ($self:ident, $client:ident => $body:expr) => {
        match $self {
            Self::Mock($client) => $body,
            Self::Bridge($client) => $body,
        }
    };
}

#[async_trait]
impl KiCadClient for ClientBackend {
    async fn connect(&mut self, options: Option<ConnectOptions>) -> ClientResult<()> {
        delegate!(self, c => c.connect(options).await)
    }

    async fn disconnect(&mut self) {
        delegate!(self, c => c.disconnect().await);
    }

    fn is_connected(&self) -> bool {
        delegate!(self, c => c.is_connected())
    }

    async fn create_project(&mut self, name: &str, path: &str) -> ClientResult<Project> {
        delegate!(self, c => c.create_project(name, path).await)
    }

    async fn open_project(&mut self, path: &str) -> ClientResult<Project> {
        delegate!(self, c => c.open_project(path).await)
    }

    async fn close_project(&mut self) -> ClientResult<()> {
        delegate!(self, c => c.close_project().await)
    }

    async fn current_project(&mut self) -> ClientResult<Option<Project>> {
        delegate!(self, c => c.current_project().await)
    }

    async fn load_board(&mut self, path: &str) -> ClientResult<Board> {
        delegate!(self, c => c.load_board(path).await)
    }

    async fn save_board(&mut self, path: &str) -> ClientResult<()> {
        delegate!(self, c => c.save_board(path).await)
    }

    async fn components(&mut self) -> ClientResult<Vec<Component>> {
        delegate!(self, c => c.components().await)
    }

    async fn add_component(&mut self, spec: ComponentSpec) -> ClientResult<Component> {
        delegate!(self, c => c.add_component(spec).await)
    }

    async fn remove_component(&mut self, reference: &str) -> ClientResult<()> {
        delegate!(self, c => c.remove_component(reference).await)
    }

    async fn run_drc(&mut self) -> ClientResult<RuleCheckResult> {
        delegate!(self, c => c.run_drc().await)
    }

    async fn run_erc(&mut self) -> ClientResult<RuleCheckResult> {
        delegate!(self, c => c.run_erc().await)
    }

    async fn auto_route(&mut self) -> ClientResult<()> {
        delegate!(self, c => c.auto_route().await)
    }

    async fn export(&mut self, request: ExportRequest) -> ClientResult<Vec<String>> {
        delegate!(self, c => c.export(request).await)
    }

    async fn generate_3d(
        &mut self,
        output_path: &str,
        format: ModelFormat,
    ) -> ClientResult<String> {
        delegate!(self, c => c.generate_3d(output_path, format).await)
    }

    async fn generate_bom(&mut self, output_path: &str) -> ClientResult<String> {
        delegate!(self, c => c.generate_bom(output_path).await)
    }

    async fn set_layer_count(&mut self, layers: u32) -> ClientResult<()> {
        delegate!(self, c => c.set_layer_count(layers).await)
    }

    async fn set_board_size(&mut self, width: f64, height: f64) -> ClientResult<()> {
        delegate!(self, c => c.set_board_size(width, height).await)
    }
}
