//! PCM stream direction as understood by ALSA and the AVIRT configfs layout.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `SND_PCM_STREAM_PLAYBACK`.
pub const SND_PCM_STREAM_PLAYBACK: i32 = 0;
/// `SND_PCM_STREAM_CAPTURE`.
pub const SND_PCM_STREAM_CAPTURE: i32 = 1;

/// Direction of a PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StreamDirection {
    #[default]
    Playback,
    Capture,
}

impl StreamDirection {
    pub const ALL: [StreamDirection; 2] = [StreamDirection::Playback, StreamDirection::Capture];

    /// Numeric value used by the kernel (`SNDRV_PCM_STREAM_*`).
    pub fn as_raw(self) -> i32 {
        match self {
            StreamDirection::Playback => SND_PCM_STREAM_PLAYBACK,
            StreamDirection::Capture => SND_PCM_STREAM_CAPTURE,
        }
    }

    /// Directory prefix used for stream entries under `snd-avirt/streams`.
    pub fn prefix(self) -> &'static str {
        match self {
            StreamDirection::Playback => "playback_",
            StreamDirection::Capture => "capture_",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StreamDirection::Playback => "playback",
            StreamDirection::Capture => "capture",
        }
    }

    /// Split a configfs directory leaf (`playback_foo`) into direction and name.
    pub fn split_dir_name(leaf: &str) -> Option<(StreamDirection, &str)> {
        StreamDirection::ALL.into_iter().find_map(|direction| {
            leaf.strip_prefix(direction.prefix())
                .filter(|name| !name.is_empty())
                .map(|name| (direction, name))
        })
    }
}

impl TryFrom<i32> for StreamDirection {
    type Error = i32;

    /// Rejected values are handed back so callers can report them.
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            SND_PCM_STREAM_PLAYBACK => Ok(StreamDirection::Playback),
            SND_PCM_STREAM_CAPTURE => Ok(StreamDirection::Capture),
            other => Err(other),
        }
    }
}

impl fmt::Display for StreamDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a direction string is neither `playback` nor `capture`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDirectionError(pub String);

impl fmt::Display for ParseDirectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown stream direction `{}` (expected playback or capture)",
            self.0
        )
    }
}

impl std::error::Error for ParseDirectionError {}

impl FromStr for StreamDirection {
    type Err = ParseDirectionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("playback") {
            Ok(StreamDirection::Playback)
        } else if trimmed.eq_ignore_ascii_case("capture") {
            Ok(StreamDirection::Capture)
        } else {
            Err(ParseDirectionError(trimmed.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_follow_alsa() {
        assert_eq!(StreamDirection::try_from(0), Ok(StreamDirection::Playback));
        assert_eq!(StreamDirection::try_from(1), Ok(StreamDirection::Capture));
        assert_eq!(StreamDirection::try_from(2), Err(2));
        assert_eq!(StreamDirection::try_from(-1), Err(-1));
        assert_eq!(StreamDirection::Capture.as_raw(), 1);
    }

    #[test]
    fn split_dir_name_recognises_prefixes() {
        assert_eq!(
            StreamDirection::split_dir_name("playback_media"),
            Some((StreamDirection::Playback, "media"))
        );
        assert_eq!(
            StreamDirection::split_dir_name("capture_mic_1"),
            Some((StreamDirection::Capture, "mic_1"))
        );
        assert_eq!(StreamDirection::split_dir_name("playback_"), None);
        assert_eq!(StreamDirection::split_dir_name("sealed"), None);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(
            " Capture ".parse::<StreamDirection>(),
            Ok(StreamDirection::Capture)
        );
        assert!("input".parse::<StreamDirection>().is_err());
    }
}
