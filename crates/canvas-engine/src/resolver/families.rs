//! Declarative key tables for input resolution
//!
//! Two tables drive the resolver:
//!
//! - `FALLBACK_KEYS`: output/parameter keys searched (in order) when the
//!   exact source port key carries nothing meaningful, grouped by family.
//! - `PortFamily::aliases`: extra keys a resolved value is also written
//!   under, because providers were integrated independently and expect
//!   differently named fields.
//!
//! Extending either table never requires touching the resolver itself.

use crate::constants::keys;
use crate::ports::PortType;

/// Semantic groups of output/parameter keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    Text,
    Image,
    Media,
    Entity,
    Narrative,
    Domain,
}

/// Fallback keys per family, in search order
pub const FALLBACK_KEYS: &[(KeyFamily, &[&str])] = &[
    (
        KeyFamily::Text,
        &[
            "text",
            "prompt",
            "enhanced",
            "enhancedPrompt",
            "result",
            "output",
            "content",
            "description",
            "caption",
            "script",
        ],
    ),
    (
        KeyFamily::Image,
        &[
            "image",
            "images",
            "imageUrl",
            "imageUrls",
            "frames",
            "grid",
            "sheet",
            "thumbnail",
        ],
    ),
    (
        KeyFamily::Media,
        &["video", "videoUrl", "audio", "audioUrl", "music"],
    ),
    (
        KeyFamily::Entity,
        &["character", "characters", "style", "lora", "persona"],
    ),
    (
        KeyFamily::Narrative,
        &[
            "story",
            "scene",
            "scenes",
            "dialogue",
            "lore",
            "outline",
            "treatment",
            "plotPoints",
            "location",
        ],
    ),
    (
        KeyFamily::Domain,
        &["garment", "outfit", "pattern", "fabric", "colorway", "design"],
    ),
];

/// Fallback keys in search order, with the preferred family first
///
/// Keys of the preferred family are probed before the remaining families,
/// which keep their table order.
pub fn fallback_keys(preferred: Option<KeyFamily>) -> impl Iterator<Item = &'static str> {
    let first = FALLBACK_KEYS
        .iter()
        .filter(move |(family, _)| Some(*family) == preferred);
    let rest = FALLBACK_KEYS
        .iter()
        .filter(move |(family, _)| Some(*family) != preferred);
    first.chain(rest).flat_map(|(_, keys)| keys.iter().copied())
}

/// Port-id fragments that identify single-value ports
///
/// An array resolved into one of these ports is collapsed to its first item.
pub const SINGLE_VALUE_PORTS: &[&str] = &[
    "model",
    "garment",
    "image",
    "person",
    "reference",
    "video",
    "audio",
];

/// Whether a target port expects a single value rather than a list
pub fn is_single_value_port(port_id: &str) -> bool {
    let id = port_id.to_ascii_lowercase();
    SINGLE_VALUE_PORTS.iter().any(|fragment| id.contains(fragment))
}

/// Semantic family of a target port, used for alias fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortFamily {
    Text,
    Image,
    Video,
    Audio,
    Character,
    Style,
    Story,
    Scene,
    Garment,
    Person,
    Generic,
}

/// Port-id fragments checked in order; the first match wins
const ID_FRAGMENTS: &[(&str, PortFamily)] = &[
    ("story", PortFamily::Story),
    ("scene", PortFamily::Scene),
    ("character", PortFamily::Character),
    ("style", PortFamily::Style),
    ("garment", PortFamily::Garment),
    ("model", PortFamily::Person),
    ("person", PortFamily::Person),
    ("video", PortFamily::Video),
    ("audio", PortFamily::Audio),
    ("music", PortFamily::Audio),
    ("image", PortFamily::Image),
    ("reference", PortFamily::Image),
    ("frame", PortFamily::Image),
    ("prompt", PortFamily::Text),
    ("text", PortFamily::Text),
];

impl PortFamily {
    /// Classify a target port by its id, then by its declared type
    pub fn classify(port_id: &str, port_type: Option<&PortType>) -> Self {
        let id = port_id.to_ascii_lowercase();
        if let Some((_, family)) = ID_FRAGMENTS.iter().find(|(fragment, _)| id.contains(fragment)) {
            return *family;
        }
        match port_type {
            Some(PortType::Text | PortType::Outline | PortType::Treatment | PortType::Dialogue) => {
                Self::Text
            }
            Some(PortType::Image) => Self::Image,
            Some(PortType::Video) => Self::Video,
            Some(PortType::Audio) => Self::Audio,
            Some(PortType::Character) => Self::Character,
            Some(PortType::Style) => Self::Style,
            Some(PortType::Story | PortType::PlotPoint) => Self::Story,
            Some(PortType::Scene | PortType::Location) => Self::Scene,
            Some(PortType::Garment | PortType::Fabric | PortType::Pattern) => Self::Garment,
            Some(PortType::Model) => Self::Person,
            Some(PortType::Any | PortType::Custom(_)) | None => Self::Generic,
        }
    }

    /// Extra keys a resolved value is also written under
    ///
    /// Story ports additionally receive `storyObject` and the flattened
    /// `Story Context` text; the resolver derives those separately.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Text => &["text", "prompt", "Input Prompt"],
            Self::Image => &["image", "images", "reference", "Source Image"],
            Self::Video => &["video", "videoUrl", "Source Video"],
            Self::Audio => &["audio", "audioUrl"],
            Self::Character => &["character", "characterReference"],
            Self::Style => &["style", "styleReference"],
            Self::Story => &["story"],
            Self::Scene => &["scene", "sceneContext"],
            Self::Garment => &["garment", "garmentImage"],
            Self::Person => &["model", "person", "modelImage"],
            Self::Generic => &[keys::DEFAULT_INPUT],
        }
    }

    /// Alias keys that carry a list rather than a single value
    pub fn is_list_alias(key: &str) -> bool {
        key == "images"
    }

    /// Fallback family searched first for this port
    pub fn preferred_keys(&self) -> Option<KeyFamily> {
        match self {
            Self::Text => Some(KeyFamily::Text),
            Self::Image | Self::Person => Some(KeyFamily::Image),
            Self::Video | Self::Audio => Some(KeyFamily::Media),
            Self::Character | Self::Style => Some(KeyFamily::Entity),
            Self::Story | Self::Scene => Some(KeyFamily::Narrative),
            Self::Garment => Some(KeyFamily::Domain),
            Self::Generic => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_order_prefers_family() {
        let keys: Vec<&str> = fallback_keys(Some(KeyFamily::Image)).collect();
        assert_eq!(keys[0], "image");
        assert_eq!(keys[1], "images");
        let text_at = keys.iter().position(|k| *k == "text").unwrap();
        let frames_at = keys.iter().position(|k| *k == "frames").unwrap();
        assert!(frames_at < text_at);

        let keys: Vec<&str> = fallback_keys(None).collect();
        assert_eq!(keys[0], "text");
        let total: usize = FALLBACK_KEYS.iter().map(|(_, k)| k.len()).sum();
        assert_eq!(keys.len(), total);
    }

    #[test]
    fn test_single_value_ports() {
        assert!(is_single_value_port("model"));
        assert!(is_single_value_port("garmentImage"));
        assert!(is_single_value_port("referenceImages"));
        assert!(is_single_value_port("Video"));
        assert!(!is_single_value_port("prompt"));
        assert!(!is_single_value_port("frames"));
    }

    #[test]
    fn test_classify_by_id_then_type() {
        assert_eq!(PortFamily::classify("prompt", None), PortFamily::Text);
        assert_eq!(PortFamily::classify("storyText", None), PortFamily::Story);
        assert_eq!(PortFamily::classify("model", None), PortFamily::Person);
        assert_eq!(
            PortFamily::classify("source", Some(&PortType::Image)),
            PortFamily::Image
        );
        assert_eq!(
            PortFamily::classify("premise", Some(&PortType::Text)),
            PortFamily::Text
        );
        assert_eq!(PortFamily::classify("anything", Some(&PortType::Any)), PortFamily::Generic);
    }

    #[test]
    fn test_alias_table() {
        assert_eq!(
            PortFamily::Text.aliases(),
            &["text", "prompt", "Input Prompt"]
        );
        assert!(PortFamily::Image.aliases().contains(&"Source Image"));
        assert_eq!(PortFamily::Generic.aliases(), &["input"]);
    }
}
