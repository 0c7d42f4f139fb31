//! configfs layout of the AVIRT driver and the filesystem operations on it.
//!
//! The driver exposes `snd-avirt/streams/` under the configfs mount point. Each
//! stream is a directory (`playback_<name>` or `capture_<name>`) holding the
//! `channels` and `map` attributes; `streams/sealed` finalises the card.

use crate::error::{AvirtError, AvirtResult};
use crate::stream::StreamSpec;
use avirt_provider::StreamDirection;
use log::debug;
use serde::Serialize;
use std::ffi::CString;
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

pub const DRIVER_SUBSYSTEM: &str = "snd-avirt";
pub const STREAMS_DIR: &str = "streams";
pub const SEALED_ATTR: &str = "sealed";
pub const CHANNELS_ATTR: &str = "channels";
pub const MAP_ATTR: &str = "map";

/// Paths of the AVIRT configfs tree rooted at a configfs mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigfsLayout {
    root: PathBuf,
}

impl ConfigfsLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn streams_dir(&self) -> PathBuf {
        self.root.join(DRIVER_SUBSYSTEM).join(STREAMS_DIR)
    }

    pub fn stream_dir(&self, spec: &StreamSpec) -> PathBuf {
        self.streams_dir().join(spec.dir_name())
    }

    pub fn sealed_path(&self) -> PathBuf {
        self.streams_dir().join(SEALED_ATTR)
    }

    /// Create the directory for `spec`; configfs instantiates its attributes.
    pub fn create_stream_dir(&self, spec: &StreamSpec) -> AvirtResult<PathBuf> {
        let path = self.stream_dir(spec);
        match DirBuilder::new().mode(0o777).create(&path) {
            Ok(()) => Ok(path),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(AvirtError::StreamExists(path))
            }
            Err(source) => Err(AvirtError::Configfs { path, source }),
        }
    }

    /// Best-effort removal of a stream directory created by this process.
    pub fn remove_stream_dir(&self, spec: &StreamSpec) {
        let path = self.stream_dir(spec);
        if let Err(err) = fs::remove_dir(&path) {
            debug!("unable to remove stream directory {}: {err}", path.display());
        }
    }

    /// Read the `sealed` attribute. A missing attribute reads as unsealed.
    pub fn read_sealed(&self) -> AvirtResult<bool> {
        let path = self.sealed_path();
        match fs::read_to_string(&path) {
            Ok(value) => Ok(value.trim() == "1"),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(AvirtError::Configfs { path, source }),
        }
    }

    pub fn write_sealed(&self) -> AvirtResult<()> {
        write_attribute(&self.sealed_path(), "1")
    }

    /// Enumerate stream directories currently present in configfs.
    pub fn list_streams(&self) -> AvirtResult<Vec<StreamEntry>> {
        let dir = self.streams_dir();
        let reader = match fs::read_dir(&dir) {
            Ok(reader) => reader,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(AvirtError::Configfs { path: dir, source }),
        };

        let mut entries = Vec::new();
        for entry in reader {
            let entry = entry.map_err(|source| AvirtError::Configfs {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let leaf = entry.file_name();
            let Some((direction, name)) = leaf.to_str().and_then(StreamDirection::split_dir_name)
            else {
                continue;
            };
            entries.push(StreamEntry {
                name: name.to_string(),
                direction,
                channels: read_attribute(&path.join(CHANNELS_ATTR))
                    .and_then(|value| value.parse().ok()),
                map: read_attribute(&path.join(MAP_ATTR)).filter(|value| !value.is_empty()),
                path,
            });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

/// A stream directory observed in configfs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamEntry {
    pub name: String,
    pub direction: StreamDirection,
    pub channels: Option<u32>,
    pub map: Option<String>,
    pub path: PathBuf,
}

/// Write `value` into a configfs attribute, truncating like `fopen(path, "w")`.
pub fn write_attribute(path: &Path, value: &str) -> AvirtResult<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|source| AvirtError::Configfs {
            path: path.to_path_buf(),
            source,
        })?;
    file.write_all(value.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|source| AvirtError::Configfs {
            path: path.to_path_buf(),
            source,
        })
}

fn read_attribute(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|value| value.trim().to_string())
}

/// Mounts configfs. Split out so the session can be driven without root.
pub trait Mounter {
    fn mount_configfs(&self, target: &Path) -> AvirtResult<()>;
}

/// Issues `mount("none", target, "configfs", 0, NULL)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMounter;

impl Mounter for SystemMounter {
    fn mount_configfs(&self, target: &Path) -> AvirtResult<()> {
        let mount_err = |source: io::Error| AvirtError::Mount {
            target: target.to_path_buf(),
            source,
        };

        if !target.exists() {
            fs::create_dir_all(target).map_err(mount_err)?;
        }

        let source = c"none";
        let fstype = c"configfs";
        let target_c = CString::new(target.as_os_str().as_bytes()).map_err(|_| {
            mount_err(io::Error::new(
                ErrorKind::InvalidInput,
                "mount point contains a NUL byte",
            ))
        })?;

        let rc = unsafe {
            libc::mount(
                source.as_ptr(),
                target_c.as_ptr(),
                fstype.as_ptr(),
                0,
                std::ptr::null(),
            )
        };
        if rc != 0 {
            return Err(mount_err(io::Error::last_os_error()));
        }
        Ok(())
    }
}
