//! Domain model: value types shared by every backend.
//!
//! All types serialise to the camelCase JSON shapes the MCP tool envelope
//! and the bridge helper exchange. Callers always receive owned values;
//! backends never hand out references into their own session state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A KiCad project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project name.
    pub name: String,
    /// Project directory path.
    pub path: String,
    /// Path to the schematic file, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schematic_path: Option<String>,
    /// Path to the board file, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcb_path: Option<String>,
}

/// The physical-layout entity: layer count, placed components, nets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    /// Path to the board file.
    pub path: String,
    /// Copper layer count, always in `1..=32`.
    pub layers: u32,
    /// Placed components, in insertion order.
    pub components: Vec<Component>,
    /// Connectivity nets.
    pub nets: Vec<Net>,
}

/// Minimum copper layer count.
pub const MIN_LAYERS: u32 = 1;
/// Maximum copper layer count.
pub const MAX_LAYERS: u32 = 32;
/// Layer count given to a board created alongside a new project.
pub const DEFAULT_LAYERS: u32 = 2;

/// A position on the board, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate in mm.
    pub x: f64,
    /// Y coordinate in mm.
    pub y: f64,
}

/// Which side of the board a component sits on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardLayer {
    /// Front copper.
    #[default]
    Front,
    /// Back copper.
    Back,
}

impl fmt::Display for BoardLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Front => write!(f, "front"),
            Self::Back => write!(f, "back"),
        }
    }
}

/// A placed component.
///
/// The reference is assigned by the backend at insertion time and is unique
/// among live components on the board. Callers never supply it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Reference designator, e.g. "U1".
    pub reference: String,
    /// Component value, e.g. "10k".
    pub value: String,
    /// Footprint identifier, e.g. "Resistor_SMD:R_0805".
    pub footprint: String,
    /// Position on the board in mm.
    pub position: Position,
    /// Rotation in degrees.
    pub rotation: f64,
    /// Board side.
    pub layer: BoardLayer,
}

/// A component specification as supplied by callers: everything a
/// [`Component`] has except the backend-assigned reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Component value.
    pub value: String,
    /// Footprint identifier.
    pub footprint: String,
    /// Position on the board in mm.
    pub position: Position,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: f64,
    /// Board side.
    #[serde(default)]
    pub layer: BoardLayer,
}

impl ComponentSpec {
    /// Materialises this specification into a component with the given
    /// reference.
    #[must_use]
    pub fn into_component(self, reference: String) -> Component {
        Component {
            reference,
            value: self.value,
            footprint: self.footprint,
            position: self.position,
            rotation: self.rotation,
            layer: self.layer,
        }
    }
}

/// A connectivity net.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Net {
    /// Net identifier.
    pub id: u32,
    /// Net name.
    pub name: String,
    /// Pins connected by this net, as "REF.PIN" strings.
    pub component_pins: Vec<String>,
}

/// A single rule violation reported by DRC or ERC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleViolation {
    /// Violation kind, e.g. "NO_COMPONENTS".
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable description.
    pub message: String,
    /// Board location of the violation, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Position>,
}

/// Result of a DRC or ERC run.
///
/// Invariant: `passed` is `true` iff `errors` is empty (the mock backend
/// additionally requires at least one component for DRC to pass).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCheckResult {
    /// Whether the check passed.
    pub passed: bool,
    /// Rule errors, in report order.
    pub errors: Vec<RuleViolation>,
    /// Rule warnings, in report order.
    pub warnings: Vec<RuleViolation>,
}

/// Fabrication export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Gerber fabrication layers.
    Gerber,
    /// Excellon drill files.
    Drill,
    /// PDF plot.
    Pdf,
    /// SVG plot.
    Svg,
    /// STEP 3D model.
    Step,
    /// VRML 3D model.
    Vrml,
}

impl ExportFormat {
    /// File extension produced for this format, without the leading dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Gerber => "gbr",
            Self::Drill => "drl",
            Self::Pdf => "pdf",
            Self::Svg => "svg",
            Self::Step => "step",
            Self::Vrml => "wrl",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gerber => "gerber",
            Self::Drill => "drill",
            Self::Pdf => "pdf",
            Self::Svg => "svg",
            Self::Step => "step",
            Self::Vrml => "vrml",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gerber" => Ok(Self::Gerber),
            "drill" => Ok(Self::Drill),
            "pdf" => Ok(Self::Pdf),
            "svg" => Ok(Self::Svg),
            "step" => Ok(Self::Step),
            "vrml" => Ok(Self::Vrml),
            other => Err(format!(
                "unknown export format '{other}' (expected gerber, drill, pdf, svg, step or vrml)"
            )),
        }
    }
}

/// 3D model formats for [`generate_3d`](crate::kicad::KiCadClient::generate_3d).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// STEP solid model.
    Step,
    /// VRML visual model.
    Vrml,
}

impl ModelFormat {
    /// File extension produced for this format, without the leading dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::Vrml => "wrl",
        }
    }

    /// The `kicad-cli pcb export` subcommand for this format.
    #[must_use]
    pub const fn cli_subcommand(self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::Vrml => "vrml",
        }
    }
}

impl FromStr for ModelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "step" => Ok(Self::Step),
            "vrml" => Ok(Self::Vrml),
            other => Err(format!(
                "unknown 3D model format '{other}' (expected step or vrml)"
            )),
        }
    }
}

/// A board export request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    /// Directory the output files are written to.
    pub output_dir: String,
    /// Requested format; determines the file extension produced.
    pub format: ExportFormat,
    /// Optional subset of layers to export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<String>>,
}

/// Connection options accepted by [`connect`](crate::kicad::KiCadClient::connect).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOptions {
    /// Connection timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Number of connection retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Delay between retries in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
}
