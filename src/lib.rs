//! kicad-mcp: MCP server and CLI for AI-assisted KiCad PCB design automation
//!
//! This library exposes KiCad project automation (project creation, component
//! placement, rule checking, export, routing) to AI assistants through a
//! uniform client abstraction with two interchangeable backends.
//!
//! # Architecture
//!
//! The core of the crate is the [`kicad::KiCadClient`] trait: the contract
//! every backend must satisfy. Two backends implement it:
//!
//! - **Mock**: an in-memory simulation with deterministic state transitions,
//!   configurable artificial latency, and one-shot fault injection. Used for
//!   fast, repeatable testing and development.
//! - **Bridge**: drives the real KiCad toolchain by spawning a Python helper
//!   process (JSON over stdout) and `kicad-cli` (exit code + stderr).
//!
//! Everything else is glue: the MCP layer registers the client's operations
//! as tools/resources/prompts, and the CLI layer wraps them as terminal
//! commands.
//!
//! # Modules
//!
//! - [`cli`] — Terminal commands (init, fix, export, bom, gen3d, route)
//! - [`config`] — Configuration loading and validation
//! - [`error`] — Configuration error types
//! - [`kicad`] — Client contract, domain model, and both backends
//! - [`mcp`] — MCP protocol implementation

pub mod cli;
pub mod config;
pub mod error;
pub mod kicad;
pub mod mcp;
