//! Stream descriptors and the validation applied before touching configfs.

use crate::error::{AvirtError, AvirtResult};
use avirt_provider::StreamDirection;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Path budget of the configfs stream directory, inherited from the kernel-side layout.
pub const STREAM_PATH_MAXLEN: usize = 64;

/// Canonical streams directory the path budget is measured against.
pub const CANONICAL_STREAMS_PATH: &str = "/config/snd-avirt/streams/";

/// Longest directory leaf (`<direction prefix><name>`) a stream may use.
pub const STREAM_DIR_NAME_MAX: usize = STREAM_PATH_MAXLEN - CANONICAL_STREAMS_PATH.len();

/// A PCM stream to be created on the virtual card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StreamSpec {
    pub name: String,

    pub channels: u32,

    #[serde(default)]
    pub direction: StreamDirection,

    /// Audio path the stream is routed to; omitted leaves the driver default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
}

impl StreamSpec {
    pub fn new(name: impl Into<String>, channels: u32, direction: StreamDirection) -> Self {
        Self {
            name: name.into(),
            channels,
            direction,
            map: None,
        }
    }

    pub fn with_map(mut self, map: impl Into<String>) -> Self {
        self.map = Some(map.into());
        self
    }

    /// Build a spec from the raw `(name, channels, direction, map)` tuple of the C interface.
    pub fn from_raw(
        name: &str,
        channels: u32,
        direction: i32,
        map: Option<&str>,
    ) -> AvirtResult<Self> {
        let direction =
            StreamDirection::try_from(direction).map_err(AvirtError::InvalidDirection)?;
        Ok(Self {
            name: name.to_string(),
            channels,
            direction,
            map: map.map(str::to_string),
        })
    }

    /// Directory leaf under `snd-avirt/streams`, e.g. `playback_media`.
    pub fn dir_name(&self) -> String {
        format!("{}{}", self.direction.prefix(), self.name)
    }

    /// Map value to write, if any. Blank values count as absent.
    pub fn effective_map(&self) -> Option<&str> {
        self.map
            .as_deref()
            .map(str::trim)
            .filter(|map| !map.is_empty())
    }

    pub fn validate(&self) -> AvirtResult<()> {
        let invalid = |reason: &str| AvirtError::InvalidStream {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.name == "." || self.name == ".." {
            return Err(invalid("name must not be `.` or `..`"));
        }
        if self.name.contains('/') || self.name.contains('\0') {
            return Err(invalid("name must not contain `/` or NUL"));
        }
        if self.channels == 0 {
            return Err(invalid("channels must be at least 1"));
        }
        if let Some(map) = &self.map {
            if map.contains('\n') || map.contains('\0') {
                return Err(invalid("map must be a single line"));
            }
        }
        if self.dir_name().len() > STREAM_DIR_NAME_MAX {
            return Err(AvirtError::NameTooLong {
                name: self.name.clone(),
                max: STREAM_DIR_NAME_MAX,
            });
        }
        Ok(())
    }
}
