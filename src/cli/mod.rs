//! Command-line workflows built on the KiCad client.
//!
//! Each subcommand opens its own client session from the configured backend,
//! performs one workflow and disconnects. Output goes to stdout; errors are
//! reported by the caller (`main`) on stderr with a non-zero exit code.

use crate::config::Config;
use crate::kicad::{
    ClientBackend, ClientError, ClientResult, ExportFormat, ExportRequest, KiCadClient,
    ModelFormat, RuleCheckResult,
};

/// Builds a client from configuration and connects it.
async fn connected_client(config: &Config) -> ClientResult<ClientBackend> {
    let mut client = ClientBackend::from_config(config);
    client.connect(None).await?;
    Ok(client)
}

/// Opens the given project when one was passed on the command line.
async fn open_if_given(client: &mut ClientBackend, project: Option<&str>) -> ClientResult<()> {
    if let Some(path) = project {
        client.open_project(path).await?;
    }
    Ok(())
}

/// Prints one rule check result with its violation counts.
fn print_check(label: &str, result: &RuleCheckResult) {
    if result.passed {
        println!("{label}: passed");
    } else {
        println!(
            "{label}: FAILED ({} error(s), {} warning(s))",
            result.errors.len(),
            result.warnings.len()
        );
    }
    for violation in result.errors.iter().chain(&result.warnings) {
        println!("  [{}] {}", violation.kind, violation.message);
    }
}

/// Creates a new project and prints the generated file paths.
///
/// # Errors
///
/// Returns an error if the backend cannot connect or project creation fails.
pub async fn init(config: &Config, name: &str, path: Option<&str>) -> ClientResult<()> {
    let mut client = connected_client(config).await?;
    let path = path.map_or_else(|| format!("./{name}"), ToString::to_string);

    let project = client.create_project(name, &path).await?;

    println!("Created project \"{}\"", project.name);
    println!("  project:   {}", project.path);
    if let Some(schematic) = &project.schematic_path {
        println!("  schematic: {schematic}");
    }
    if let Some(pcb) = &project.pcb_path {
        println!("  pcb:       {pcb}");
    }

    client.disconnect().await;
    Ok(())
}

/// Runs DRC and ERC and prints both results.
///
/// Returns `true` when both checks passed.
///
/// # Errors
///
/// Returns an error if the backend cannot connect or either check fails to
/// run at all (as opposed to reporting violations).
pub async fn fix(config: &Config, project: Option<&str>) -> ClientResult<bool> {
    let mut client = connected_client(config).await?;
    open_if_given(&mut client, project).await?;

    let drc = client.run_drc().await?;
    print_check("DRC", &drc);

    let erc = client.run_erc().await?;
    print_check("ERC", &erc);

    client.disconnect().await;
    Ok(drc.passed && erc.passed)
}

/// Exports the board and prints the produced files.
///
/// # Errors
///
/// Returns an error if the backend cannot connect or the export fails.
pub async fn export(
    config: &Config,
    format: ExportFormat,
    project: Option<&str>,
    output_dir: &str,
) -> ClientResult<()> {
    let mut client = connected_client(config).await?;
    open_if_given(&mut client, project).await?;

    let files = client
        .export(ExportRequest {
            output_dir: output_dir.to_string(),
            format,
            layers: None,
        })
        .await?;

    println!("Exported {} file(s) in {format} format:", files.len());
    for file in &files {
        println!("  {file}");
    }

    client.disconnect().await;
    Ok(())
}

/// Generates a bill of materials and prints its path.
///
/// # Errors
///
/// Returns an error if the backend cannot connect or BOM generation fails.
pub async fn bom(config: &Config, project: Option<&str>, output: &str) -> ClientResult<()> {
    let mut client = connected_client(config).await?;
    open_if_given(&mut client, project).await?;

    let path = client.generate_bom(output).await?;
    println!("BOM written to {path}");

    client.disconnect().await;
    Ok(())
}

/// Generates a 3D model of the board and prints its path.
///
/// # Errors
///
/// Returns an error if the backend cannot connect or model generation fails.
pub async fn gen3d(
    config: &Config,
    project: Option<&str>,
    format: ModelFormat,
    output: &str,
) -> ClientResult<()> {
    let mut client = connected_client(config).await?;
    open_if_given(&mut client, project).await?;

    let path = client.generate_3d(output, format).await?;
    println!("3D model written to {path}");

    client.disconnect().await;
    Ok(())
}

/// Auto-routes the current board.
///
/// # Errors
///
/// Returns an error if the backend cannot connect or routing fails.
pub async fn route(config: &Config, project: Option<&str>) -> ClientResult<()> {
    let mut client = connected_client(config).await?;
    open_if_given(&mut client, project).await?;

    client.auto_route().await?;
    println!("Auto-routing completed");

    client.disconnect().await;
    Ok(())
}

/// Formats a client error for the terminal, including its stable code.
#[must_use]
pub fn format_error(error: &ClientError) -> String {
    format!("{}: {error}", error.code())
}
