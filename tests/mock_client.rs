//! Integration tests for the in-memory simulation backend.
//!
//! Exercises the full client contract through the public API: session
//! lifecycle, project management, component placement, rule checks, export
//! and the fault-injection test hooks.

use std::time::Duration;

use kicad_mcp::kicad::types::{BoardLayer, Position};
use kicad_mcp::kicad::{
    ClientError, ComponentSpec, ExportFormat, ExportRequest, KiCadClient, MockClient, ModelFormat,
};

fn client() -> MockClient {
    let mut client = MockClient::new();
    client.set_simulate_delay(Duration::ZERO);
    client
}

async fn connected() -> MockClient {
    let mut client = client();
    client.connect(None).await.unwrap();
    client
}

fn resistor(x: f64, y: f64) -> ComponentSpec {
    ComponentSpec {
        value: "10k".to_string(),
        footprint: "Resistor_SMD:R_0805_2012Metric".to_string(),
        position: Position { x, y },
        rotation: 0.0,
        layer: BoardLayer::Front,
    }
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn connect_then_disconnect() {
    let mut client = client();
    assert!(!client.is_connected());

    client.connect(None).await.unwrap();
    assert!(client.is_connected());

    client.disconnect().await;
    assert!(!client.is_connected());
}

#[tokio::test]
async fn operations_require_connection() {
    let mut client = client();

    let err = client.create_project("amp", "/tmp/amp").await.unwrap_err();
    assert_eq!(err.code(), "CONNECTION_ERROR");

    let err = client.components().await.unwrap_err();
    assert_eq!(err.code(), "CONNECTION_ERROR");

    let err = client.run_drc().await.unwrap_err();
    assert_eq!(err.code(), "CONNECTION_ERROR");
}

#[tokio::test]
async fn simulated_latency_is_awaited() {
    let mut client = MockClient::new();
    client.set_simulate_delay(Duration::from_millis(30));

    let start = std::time::Instant::now();
    client.connect(None).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(30));
}

// =============================================================================
// Project management
// =============================================================================

#[tokio::test]
async fn create_project_returns_file_paths() {
    let mut client = connected().await;

    let project = client.create_project("amp", "/tmp/amp").await.unwrap();
    assert_eq!(project.name, "amp");
    assert_eq!(project.path, "/tmp/amp");
    assert_eq!(project.schematic_path.as_deref(), Some("/tmp/amp/amp.kicad_sch"));
    assert_eq!(project.pcb_path.as_deref(), Some("/tmp/amp/amp.kicad_pcb"));
}

#[tokio::test]
async fn create_project_becomes_current() {
    let mut client = connected().await;
    client.create_project("amp", "/tmp/amp").await.unwrap();

    let current = client.current_project().await.unwrap();
    assert_eq!(current.unwrap().name, "amp");
}

#[tokio::test]
async fn open_project_derives_name_from_path() {
    let mut client = connected().await;

    let project = client.open_project("/work/boards/psu").await.unwrap();
    assert_eq!(project.name, "psu");

    let current = client.current_project().await.unwrap();
    assert_eq!(current.unwrap().name, "psu");
}

#[tokio::test]
async fn close_project_clears_session() {
    let mut client = connected().await;
    client.create_project("amp", "/tmp/amp").await.unwrap();
    client.add_component(resistor(10.0, 10.0)).await.unwrap();

    client.close_project().await.unwrap();

    assert!(client.current_project().await.unwrap().is_none());
    assert!(client.components().await.unwrap().is_empty());
}

#[tokio::test]
async fn creating_a_second_project_resets_components() {
    let mut client = connected().await;
    client.create_project("amp", "/tmp/amp").await.unwrap();
    client.add_component(resistor(10.0, 10.0)).await.unwrap();

    client.create_project("psu", "/tmp/psu").await.unwrap();
    assert!(client.components().await.unwrap().is_empty());
}

// =============================================================================
// Components
// =============================================================================

#[tokio::test]
async fn references_are_assigned_sequentially() {
    let mut client = connected().await;
    client.create_project("amp", "/tmp/amp").await.unwrap();

    let first = client.add_component(resistor(10.0, 10.0)).await.unwrap();
    let second = client.add_component(resistor(20.0, 10.0)).await.unwrap();
    let third = client.add_component(resistor(30.0, 10.0)).await.unwrap();

    assert_eq!(first.reference, "U1");
    assert_eq!(second.reference, "U2");
    assert_eq!(third.reference, "U3");
}

#[tokio::test]
async fn added_component_keeps_caller_fields() {
    let mut client = connected().await;
    client.create_project("amp", "/tmp/amp").await.unwrap();

    let spec = ComponentSpec {
        value: "STM32F103".to_string(),
        footprint: "Package_QFP:LQFP-48_7x7mm_P0.5mm".to_string(),
        position: Position { x: 50.0, y: 40.0 },
        rotation: 90.0,
        layer: BoardLayer::Back,
    };
    let component = client.add_component(spec).await.unwrap();

    assert_eq!(component.value, "STM32F103");
    assert_eq!(component.position, Position { x: 50.0, y: 40.0 });
    assert_eq!(component.rotation, 90.0);
    assert_eq!(component.layer, BoardLayer::Back);
}

#[tokio::test]
async fn remove_component_by_reference() {
    let mut client = connected().await;
    client.create_project("amp", "/tmp/amp").await.unwrap();
    client.add_component(resistor(10.0, 10.0)).await.unwrap();
    client.add_component(resistor(20.0, 10.0)).await.unwrap();

    client.remove_component("U1").await.unwrap();

    let components = client.components().await.unwrap();
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].reference, "U2");
}

#[tokio::test]
async fn remove_unknown_component_is_operation_error() {
    let mut client = connected().await;
    client.create_project("amp", "/tmp/amp").await.unwrap();

    let err = client.remove_component("C99").await.unwrap_err();
    assert_eq!(err.code(), "OPERATION_ERROR");
    assert!(err.to_string().contains("C99"));
}

#[tokio::test]
async fn references_can_repeat_after_removal() {
    // Reference assignment derives from the list length, so removal followed
    // by re-addition repeats a sequence position. This mirrors the live
    // toolchain and is part of the contract.
    let mut client = connected().await;
    client.create_project("amp", "/tmp/amp").await.unwrap();

    client.add_component(resistor(10.0, 10.0)).await.unwrap();
    client.add_component(resistor(20.0, 10.0)).await.unwrap();
    client.remove_component("U1").await.unwrap();

    let readded = client.add_component(resistor(30.0, 10.0)).await.unwrap();
    assert_eq!(readded.reference, "U2");
}

// =============================================================================
// Rule checks and routing
// =============================================================================

#[tokio::test]
async fn drc_fails_on_empty_board() {
    let mut client = connected().await;
    client.create_project("amp", "/tmp/amp").await.unwrap();

    let result = client.run_drc().await.unwrap();
    assert!(!result.passed);
    assert!(result.errors.is_empty());
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].kind, "NO_COMPONENTS");
}

#[tokio::test]
async fn drc_passes_with_components() {
    let mut client = connected().await;
    client.create_project("amp", "/tmp/amp").await.unwrap();
    client.add_component(resistor(10.0, 10.0)).await.unwrap();

    let result = client.run_drc().await.unwrap();
    assert!(result.passed);
    assert!(result.warnings.is_empty());
}

#[tokio::test]
async fn erc_always_passes_in_simulation() {
    let mut client = connected().await;
    client.create_project("amp", "/tmp/amp").await.unwrap();

    let result = client.run_erc().await.unwrap();
    assert!(result.passed);
}

#[tokio::test]
async fn auto_route_requires_components() {
    let mut client = connected().await;
    client.create_project("amp", "/tmp/amp").await.unwrap();

    let err = client.auto_route().await.unwrap_err();
    assert_eq!(err.code(), "OPERATION_ERROR");

    client.add_component(resistor(10.0, 10.0)).await.unwrap();
    client.auto_route().await.unwrap();
}

// =============================================================================
// Export and generation
// =============================================================================

#[tokio::test]
async fn export_names_file_after_project_and_format() {
    let mut client = connected().await;
    client.create_project("amp", "/tmp/amp").await.unwrap();

    let files = client
        .export(ExportRequest {
            output_dir: "/tmp/out".to_string(),
            format: ExportFormat::Gerber,
            layers: None,
        })
        .await
        .unwrap();
    assert_eq!(files, vec!["/tmp/out/amp.gbr".to_string()]);

    let files = client
        .export(ExportRequest {
            output_dir: "/tmp/out".to_string(),
            format: ExportFormat::Drill,
            layers: None,
        })
        .await
        .unwrap();
    assert_eq!(files, vec!["/tmp/out/amp.drl".to_string()]);
}

#[tokio::test]
async fn export_without_project_uses_generic_base_name() {
    let mut client = connected().await;

    let files = client
        .export(ExportRequest {
            output_dir: "/tmp/out".to_string(),
            format: ExportFormat::Pdf,
            layers: None,
        })
        .await
        .unwrap();
    assert_eq!(files, vec!["/tmp/out/board.pdf".to_string()]);
}

#[tokio::test]
async fn generate_3d_appends_format_extension() {
    let mut client = connected().await;
    client.create_project("amp", "/tmp/amp").await.unwrap();

    let step = client.generate_3d("/tmp/amp-3d", ModelFormat::Step).await.unwrap();
    assert_eq!(step, "/tmp/amp-3d.step");

    let vrml = client.generate_3d("/tmp/amp-3d", ModelFormat::Vrml).await.unwrap();
    assert_eq!(vrml, "/tmp/amp-3d.wrl");
}

#[tokio::test]
async fn generate_bom_appends_csv_extension() {
    let mut client = connected().await;
    client.create_project("amp", "/tmp/amp").await.unwrap();

    let path = client.generate_bom("/tmp/amp-bom").await.unwrap();
    assert_eq!(path, "/tmp/amp-bom.csv");
}

// =============================================================================
// Fault injection
// =============================================================================

#[tokio::test]
async fn injected_connect_fault_is_connection_error() {
    let mut client = client();
    client.inject_error("connect");

    let err = client.connect(None).await.unwrap_err();
    assert!(matches!(err, ClientError::Connection { .. }));

    // One-shot: the retry succeeds.
    client.connect(None).await.unwrap();
}

#[tokio::test]
async fn injected_project_faults_are_project_errors() {
    let mut client = connected().await;

    client.inject_error("create_project");
    let err = client.create_project("amp", "/tmp/amp").await.unwrap_err();
    assert_eq!(err.code(), "PROJECT_ERROR");

    client.inject_error("open_project");
    let err = client.open_project("/tmp/amp").await.unwrap_err();
    assert_eq!(err.code(), "PROJECT_ERROR");
    assert!(err.to_string().contains("/tmp/amp"));
}

#[tokio::test]
async fn injected_operation_faults_surface_the_operation_name() {
    let mut client = connected().await;
    client.create_project("amp", "/tmp/amp").await.unwrap();

    for operation in ["components", "add_component", "export", "generate_bom"] {
        client.inject_error(operation);
        let err = match operation {
            "components" => client.components().await.unwrap_err(),
            "add_component" => client.add_component(resistor(0.0, 0.0)).await.unwrap_err(),
            "export" => client
                .export(ExportRequest {
                    output_dir: "/tmp/out".to_string(),
                    format: ExportFormat::Svg,
                    layers: None,
                })
                .await
                .unwrap_err(),
            _ => client.generate_bom("/tmp/bom").await.unwrap_err(),
        };
        assert_eq!(err.code(), "OPERATION_ERROR");
        assert!(err.to_string().contains(operation));
    }
}

#[tokio::test]
async fn fault_survives_unrelated_operations() {
    let mut client = connected().await;
    client.inject_error("run_drc");

    // Unrelated calls leave the fault armed.
    client.create_project("amp", "/tmp/amp").await.unwrap();
    client.add_component(resistor(10.0, 10.0)).await.unwrap();

    let err = client.run_drc().await.unwrap_err();
    assert_eq!(err.code(), "OPERATION_ERROR");

    // Consumed: the second run succeeds.
    let result = client.run_drc().await.unwrap();
    assert!(result.passed);
}
