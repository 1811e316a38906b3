use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Framing strategies for the extension byte stream.
///
/// Strict mode trusts the 4-byte length header exactly. Tolerant mode treats
/// the header as unreliable and locates message boundaries by JSON structure
/// scanning; it exists for extension builds affected by a known length-header
/// bug near a message-size boundary.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FramingMode {
    /// Trust the declared length header exactly.
    #[default]
    Strict,
    /// Ignore the header value and scan for balanced JSON objects.
    Tolerant,
}

/// Errors encountered while parsing a [`FramingMode`] from text.
pub type FramingModeParseError = strum::ParseError;
