//! Quality profiles
//!
//! A profile decides whether a candidate is "preferred". The order of
//! `formats` is the priority used by [`QualityProfile::select_stream`].

use crate::backend::BackendKind;
use crate::stream::{Resolution, Stream, StreamFormat, StreamKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resolution ceiling of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResolutionSetting {
    /// No ceiling
    Best,

    /// Accept up to and including this resolution
    Max(Resolution),
}

impl ResolutionSetting {
    /// Whether a known resolution fits under the ceiling
    pub fn allows(&self, resolution: Resolution) -> bool {
        if resolution.is_unknown() {
            return false;
        }
        match self {
            ResolutionSetting::Best => true,
            ResolutionSetting::Max(ceiling) => resolution <= *ceiling,
        }
    }
}

impl fmt::Display for ResolutionSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionSetting::Best => f.write_str("best"),
            ResolutionSetting::Max(resolution) => write!(f, "{}", resolution),
        }
    }
}

impl TryFrom<String> for ResolutionSetting {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case("best") {
            Ok(ResolutionSetting::Best)
        } else {
            value.parse().map(ResolutionSetting::Max)
        }
    }
}

impl From<ResolutionSetting> for String {
    fn from(value: ResolutionSetting) -> Self {
        value.to_string()
    }
}

impl StreamFormat {
    /// Whether a stream satisfies this format entry of a profile
    pub fn matches(&self, stream: &Stream) -> bool {
        match self {
            StreamFormat::Stream => stream.kind() == StreamKind::Stream,
            StreamFormat::Hls => stream.kind() == StreamKind::Hls,
            format => stream.format == *format,
        }
    }
}

/// User-authored quality policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    /// Display name
    pub name: String,

    /// Backend this profile applies to (any when unset)
    #[serde(default)]
    pub backend: Option<BackendKind>,

    /// Resolution ceiling
    pub resolution: ResolutionSetting,

    /// Accepted formats, highest priority first
    pub formats: Vec<StreamFormat>,

    /// Fallback profile when no backend-specific one exists
    #[serde(default)]
    pub default: bool,
}

impl Default for QualityProfile {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            backend: None,
            resolution: ResolutionSetting::Max(Resolution::HD1080P60),
            formats: vec![
                StreamFormat::Hls,
                StreamFormat::Stream,
                StreamFormat::Avc1,
                StreamFormat::Mp4,
                StreamFormat::Av1,
                StreamFormat::Webm,
            ],
            default: true,
        }
    }
}

impl QualityProfile {
    /// Whether the stream satisfies this profile
    pub fn is_preferred(&self, stream: &Stream) -> bool {
        // HLS adapts by itself, the ceiling does not apply
        if self.formats.contains(&StreamFormat::Hls) && stream.kind() == StreamKind::Hls {
            return true;
        }

        let resolution_match = self.resolution.allows(stream.resolution);
        let format_match = self.formats.iter().any(|format| format.matches(stream));

        resolution_match && format_match
    }

    /// Pick the stream to play from `streams`.
    ///
    /// Formats are tried in priority order; within a format the highest
    /// preferred resolution wins, ties going to the earlier candidate. When
    /// nothing is preferred the first candidate is returned so playback can
    /// still start.
    pub fn select_stream<'a>(&self, streams: &'a [Stream]) -> Option<&'a Stream> {
        self.formats
            .iter()
            .find_map(|format| {
                streams
                    .iter()
                    .filter(|stream| format.matches(stream) && self.is_preferred(stream))
                    .reduce(|best, stream| {
                        if stream.resolution > best.resolution {
                            stream
                        } else {
                            best
                        }
                    })
            })
            .or_else(|| streams.first())
    }
}

/// The configured set of profiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityProfiles {
    /// All profiles
    #[serde(default)]
    pub profiles: Vec<QualityProfile>,
}

impl Default for QualityProfiles {
    fn default() -> Self {
        Self {
            profiles: vec![QualityProfile::default()],
        }
    }
}

impl QualityProfiles {
    /// Profile for a backend: exact backend match, then the default
    /// profile, then the built-in default.
    pub fn for_backend(&self, backend: Option<BackendKind>) -> QualityProfile {
        backend
            .and_then(|kind| self.profiles.iter().find(|p| p.backend == Some(kind)))
            .or_else(|| self.profiles.iter().find(|p| p.default))
            .or_else(|| self.profiles.first())
            .cloned()
            .unwrap_or_default()
    }

    /// Look up a profile by name (case insensitive)
    pub fn by_name(&self, name: &str) -> Option<&QualityProfile> {
        self.profiles.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}
