//! Port type catalog and compatibility rules
//!
//! Type-checking here is intentionally cheap: `any` is a wildcard and
//! everything else must match by name. Semantic widening (a `model` photo or
//! a `character` sheet both being usable as an image) is handled by the
//! input resolver, which has the upstream values in hand.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The data type carried by a port
///
/// The set is closed for the types the canvas knows about and extensible
/// through `Custom`, which round-trips unknown names unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PortType {
    /// Accepts any type
    Any,
    Image,
    Video,
    Audio,
    Text,
    Garment,
    Model,
    Fabric,
    Pattern,
    Character,
    Style,
    Story,
    Scene,
    Location,
    Dialogue,
    Outline,
    Treatment,
    PlotPoint,
    /// A type name not in the built-in catalog
    Custom(String),
}

impl PortType {
    /// Every built-in port type, in catalog order
    pub const BUILTIN: &'static [PortType] = &[
        PortType::Any,
        PortType::Image,
        PortType::Video,
        PortType::Audio,
        PortType::Text,
        PortType::Garment,
        PortType::Model,
        PortType::Fabric,
        PortType::Pattern,
        PortType::Character,
        PortType::Style,
        PortType::Story,
        PortType::Scene,
        PortType::Location,
        PortType::Dialogue,
        PortType::Outline,
        PortType::Treatment,
        PortType::PlotPoint,
    ];

    /// Wire name of this type
    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => "any",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Text => "text",
            Self::Garment => "garment",
            Self::Model => "model",
            Self::Fabric => "fabric",
            Self::Pattern => "pattern",
            Self::Character => "character",
            Self::Style => "style",
            Self::Story => "story",
            Self::Scene => "scene",
            Self::Location => "location",
            Self::Dialogue => "dialogue",
            Self::Outline => "outline",
            Self::Treatment => "treatment",
            Self::PlotPoint => "plotPoint",
            Self::Custom(name) => name,
        }
    }

    /// Whether this is the wildcard type
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Check whether an output of this type may feed an input of `input` type
    /// under the default (loose) rules
    pub fn is_compatible_with(&self, input: &PortType) -> bool {
        is_compatible(self, input, TypeCheckMode::Loose)
    }
}

impl From<String> for PortType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "any" => Self::Any,
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "text" => Self::Text,
            "garment" => Self::Garment,
            "model" => Self::Model,
            "fabric" => Self::Fabric,
            "pattern" => Self::Pattern,
            "character" => Self::Character,
            "style" => Self::Style,
            "story" => Self::Story,
            "scene" => Self::Scene,
            "location" => Self::Location,
            "dialogue" => Self::Dialogue,
            "outline" => Self::Outline,
            "treatment" => Self::Treatment,
            "plotPoint" => Self::PlotPoint,
            _ => Self::Custom(name),
        }
    }
}

impl From<&str> for PortType {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<PortType> for String {
    fn from(port_type: PortType) -> Self {
        port_type.as_str().to_string()
    }
}

impl FromStr for PortType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How strictly port types are compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCheckMode {
    /// `any` matches everything on either side, otherwise names must match
    #[default]
    Loose,
    /// An `any` input still accepts everything, but an untyped (`any`)
    /// output may only feed another `any` input
    Strict,
}

/// Decide whether an output of type `output` may connect to an input of type
/// `input`
pub fn is_compatible(output: &PortType, input: &PortType, mode: TypeCheckMode) -> bool {
    if input.is_any() {
        return true;
    }
    if output.is_any() {
        return mode == TypeCheckMode::Loose;
    }
    output == input
}
