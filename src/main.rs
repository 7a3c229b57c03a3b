//! kicad-mcp: MCP server and CLI for AI-assisted KiCad PCB design automation.
//!
//! Without a subcommand this runs the MCP server over stdio. The remaining
//! subcommands drive the same client backend directly from the terminal.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use kicad_mcp::cli;
use kicad_mcp::config::{self, Config};
use kicad_mcp::kicad::{ClientBackend, ExportFormat, ModelFormat};
use kicad_mcp::mcp::server::McpServer;

/// MCP server and CLI for AI-assisted KiCad PCB design automation.
///
/// Exposes project management, component placement, rule checks, export,
/// BOM and 3D generation over the Model Context Protocol, backed by either
/// an in-memory simulation or the real KiCad toolchain.
#[derive(Parser, Debug)]
#[command(name = "kicad-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "CONFIG_FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server over stdio (the default)
    Serve,

    /// Create a new KiCad project
    Init {
        /// Project name
        name: String,
        /// Project path (defaults to ./<name>)
        path: Option<String>,
    },

    /// Run DRC and ERC and report violations
    Fix {
        /// Project path (uses the current session's project if omitted)
        project: Option<String>,
    },

    /// Export the board to a fabrication format
    Export {
        /// Export format: gerber, drill, pdf, svg, step or vrml
        format: ExportFormat,
        /// Project path
        project: Option<String>,
        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: String,
    },

    /// Generate a bill of materials
    Bom {
        /// Project path
        project: Option<String>,
        /// Output file path
        #[arg(short, long, value_name = "FILE")]
        output: String,
    },

    /// Generate a 3D model of the board
    Gen3d {
        /// Project path
        project: Option<String>,
        /// 3D model format: step or vrml
        #[arg(short, long, default_value = "step")]
        format: ModelFormat,
        /// Output file path
        #[arg(short, long, value_name = "FILE")]
        output: String,
    },

    /// Automatically route PCB traces
    Route {
        /// Project path
        project: Option<String>,
    },
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs the MCP server over stdio until EOF or a shutdown signal.
async fn serve(config: &Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.backend,
        "Starting kicad-mcp server"
    );

    let mut server = McpServer::new(ClientBackend::from_config(config));

    info!("MCP server ready, waiting for client connection...");

    match server.run().await {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

/// Dispatches the selected subcommand.
async fn run(config: &Config, command: Command) -> ExitCode {
    let outcome = match command {
        Command::Serve => return serve(config).await,
        Command::Init { name, path } => cli::init(config, &name, path.as_deref()).await,
        Command::Fix { project } => match cli::fix(config, project.as_deref()).await {
            Ok(true) => return ExitCode::SUCCESS,
            Ok(false) => return ExitCode::FAILURE,
            Err(e) => Err(e),
        },
        Command::Export {
            format,
            project,
            output,
        } => cli::export(config, format, project.as_deref(), &output).await,
        Command::Bom { project, output } => cli::bom(config, project.as_deref(), &output).await,
        Command::Gen3d {
            project,
            format,
            output,
        } => cli::gen3d(config, project.as_deref(), format, &output).await,
        Command::Route { project } => cli::route(config, project.as_deref()).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", cli::format_error(&e));
            ExitCode::FAILURE
        }
    }
}

/// Entry point for kicad-mcp.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nExpected config at: {}", default_path.display());
                    eprintln!("Create one based on config/example-config.json");
                }
            }
            return ExitCode::FAILURE;
        }
    };

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    let command = args.command.unwrap_or(Command::Serve);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(&cfg, command))
}
