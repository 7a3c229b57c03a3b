//! KiCad client abstraction: domain model, error taxonomy, client contract,
//! and the two backends that implement it.
//!
//! # Backends
//!
//! - [`MockClient`] — deterministic in-memory simulation for testing and
//!   development (artificial latency, one-shot fault injection).
//! - [`BridgeClient`] — orchestrates the real toolchain: a Python helper
//!   process speaking a one-object-JSON-on-stdout protocol, and `kicad-cli`
//!   for 3D export.
//!
//! [`ClientBackend`] wraps the two behind a single type selected from
//! configuration at construction time.

pub mod bridge;
pub mod client;
pub mod error;
pub mod mock;
pub mod types;

pub use bridge::BridgeClient;
pub use client::{ClientBackend, KiCadClient};
pub use error::{ClientError, ClientResult};
pub use mock::MockClient;
pub use types::{
    Board, BoardLayer, Component, ComponentSpec, ConnectOptions, ExportFormat, ExportRequest,
    ModelFormat, Net, Position, Project, RuleCheckResult, RuleViolation,
};
