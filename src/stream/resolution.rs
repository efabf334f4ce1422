//! Resolution tiers and container formats
//!
//! Backends describe quality with loose labels ("720p", "1080p60",
//! "1920x1080", "hd720"). Everything is normalized into [`Resolution`],
//! which orders by height first and refresh rate second.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Refresh rate assumed when a label does not carry one
const DEFAULT_REFRESH_RATE: u32 = 30;

/// Video resolution tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    /// Vertical resolution in lines (0 = unknown)
    pub height: u32,

    /// Frames per second
    pub refresh_rate: u32,
}

impl Resolution {
    pub const UNKNOWN: Resolution = Resolution::new(0, 0);
    pub const SD144: Resolution = Resolution::new(144, 30);
    pub const SD240: Resolution = Resolution::new(240, 30);
    pub const SD360: Resolution = Resolution::new(360, 30);
    pub const SD480: Resolution = Resolution::new(480, 30);
    pub const HD720: Resolution = Resolution::new(720, 30);
    pub const HD720P60: Resolution = Resolution::new(720, 60);
    pub const HD1080: Resolution = Resolution::new(1080, 30);
    pub const HD1080P60: Resolution = Resolution::new(1080, 60);
    pub const HD1440: Resolution = Resolution::new(1440, 30);
    pub const HD1440P60: Resolution = Resolution::new(1440, 60);
    pub const HD2160: Resolution = Resolution::new(2160, 30);
    pub const HD2160P60: Resolution = Resolution::new(2160, 60);

    /// Create a resolution from height and refresh rate
    pub const fn new(height: u32, refresh_rate: u32) -> Self {
        Self { height, refresh_rate }
    }

    /// Whether the backend gave us anything usable
    pub fn is_unknown(&self) -> bool {
        self.height == 0
    }

    /// Parse a backend quality label, returning `UNKNOWN` on garbage.
    ///
    /// Accepted shapes: `720p`, `720p60`, `1080p60 HDR`, `1920x1080`,
    /// `hd720`, `720`.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(Resolution::UNKNOWN)
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_ascii_lowercase();
        let label = label.split_whitespace().next().unwrap_or("");

        // "1920x1080" carries the height after the separator
        let label = match label.split_once('x') {
            Some((_, height)) => height,
            None => label.trim_start_matches("hd").trim_start_matches("sd"),
        };

        let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
        let height: u32 = digits
            .parse()
            .map_err(|_| format!("invalid resolution label '{}'", s))?;

        let rest = &label[digits.len()..];
        let rest = rest.strip_prefix('p').unwrap_or(rest);
        let fps_digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        let refresh_rate = fps_digits.parse().unwrap_or(DEFAULT_REFRESH_RATE);

        Ok(Resolution::new(height, refresh_rate))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "unknown")
        } else if self.refresh_rate > DEFAULT_REFRESH_RATE {
            write!(f, "{}p{}", self.height, self.refresh_rate)
        } else {
            write!(f, "{}p", self.height)
        }
    }
}

impl TryFrom<String> for Resolution {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case("unknown") {
            return Ok(Resolution::UNKNOWN);
        }
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

/// Container / encoding tag of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    /// Adaptive HLS playlist
    Hls,

    /// Any single-asset (muxed) stream, regardless of container
    Stream,

    /// MP4 container, codec not specified
    Mp4,

    /// H.264 in MP4
    Avc1,

    /// AV1
    Av1,

    /// WebM container (VP8/VP9)
    Webm,

    /// Anything we cannot classify
    Unknown,
}

impl StreamFormat {
    /// Classify a MIME type such as `video/mp4; codecs="avc1.64001F"`
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();

        if mime.contains("mpegurl") {
            StreamFormat::Hls
        } else if mime.contains("av01") {
            StreamFormat::Av1
        } else if mime.contains("avc1") {
            StreamFormat::Avc1
        } else if mime.starts_with("video/webm") || mime.starts_with("audio/webm") {
            StreamFormat::Webm
        } else if mime.starts_with("video/mp4") || mime.starts_with("audio/mp4") {
            StreamFormat::Mp4
        } else {
            StreamFormat::Unknown
        }
    }

    /// Classify from a container name and an optional codec string
    pub fn from_container(container: &str, codec: Option<&str>) -> Self {
        let codec = codec.unwrap_or("").to_ascii_lowercase();
        if codec.starts_with("av01") {
            return StreamFormat::Av1;
        }
        if codec.starts_with("avc1") {
            return StreamFormat::Avc1;
        }

        match container.to_ascii_lowercase().as_str() {
            "mp4" | "mpeg_4" | "m4a" => StreamFormat::Mp4,
            "webm" | "webma_opus" => StreamFormat::Webm,
            "m3u8" | "hls" => StreamFormat::Hls,
            _ => StreamFormat::Unknown,
        }
    }

    /// Short label for display
    pub fn label(&self) -> &'static str {
        match self {
            StreamFormat::Hls => "HLS",
            StreamFormat::Stream => "Stream",
            StreamFormat::Mp4 => "MP4",
            StreamFormat::Avc1 => "AVC1",
            StreamFormat::Av1 => "AV1",
            StreamFormat::Webm => "WebM",
            StreamFormat::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
