//! Configuration model and helpers used by the AVIRT tools.

use crate::error::{AvirtError, AvirtResult};
use crate::stream::StreamSpec;
use avirt_provider::StreamDirection;
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/avirt.toml";
pub const CONFIG_PATH_ENV: &str = "AVIRT_CONFIG";

const BOOTSTRAP_TEMPLATE: &str = r#"# Auto-generated AVIRT configuration bootstrap.
# Declare the PCM streams of the virtual card, then run `avirt apply`.

[configfs]
# Where configfs is mounted when it is not mounted already.
mount_point = "/config"
auto_mount = true
# mounts_path = "/proc/mounts"

[control]
dev_dir = "/dev/snd"
card_id = "avirt"

# [[streams]]
# name = "multimedia"
# channels = 2
# direction = "playback"
# map = "ap_loopback"
"#;

/// Emit the bootstrap configuration template.
pub fn bootstrap_template() -> &'static str {
    BOOTSTRAP_TEMPLATE
}

/// configfs mount settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConfigfsCfg {
    #[serde(default = "default_mount_point")]
    pub mount_point: PathBuf,

    /// Mount configfs on demand when no configfs mount is detected.
    #[serde(default = "default_auto_mount")]
    pub auto_mount: bool,

    /// Mount table consulted for detection (`/proc/mounts` when unset).
    #[serde(default)]
    pub mounts_path: Option<PathBuf>,
}

fn default_mount_point() -> PathBuf {
    PathBuf::from("/config")
}

fn default_auto_mount() -> bool {
    true
}

impl Default for ConfigfsCfg {
    fn default() -> Self {
        Self {
            mount_point: default_mount_point(),
            auto_mount: default_auto_mount(),
            mounts_path: None,
        }
    }
}

/// ALSA control-device lookup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ControlCfg {
    #[serde(default = "default_dev_dir")]
    pub dev_dir: PathBuf,

    /// Card id (or driver name) the registered card reports.
    #[serde(default = "default_card_id")]
    pub card_id: String,
}

fn default_dev_dir() -> PathBuf {
    PathBuf::from("/dev/snd")
}

fn default_card_id() -> String {
    "avirt".to_string()
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            dev_dir: default_dev_dir(),
            card_id: default_card_id(),
        }
    }
}

/// Top-level configuration snapshot loaded from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AvirtConfig {
    #[serde(default)]
    pub configfs: ConfigfsCfg,

    #[serde(default)]
    pub control: ControlCfg,

    #[serde(default)]
    pub streams: Vec<StreamSpec>,

    #[serde(skip)]
    pub path: PathBuf,

    #[serde(skip)]
    pub format: ConfigFormat,
}

/// Tracks whether we parsed TOML or YAML so writes preserve format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Yaml,
}

impl AvirtConfig {
    /// Load configuration from disk, writing the bootstrap template first
    /// when the file does not exist yet.
    pub fn load_or_bootstrap<P: AsRef<Path>>(path: P) -> AvirtResult<Self> {
        let path = path.as_ref();
        match write_template_if_missing(path) {
            Ok(true) => info!("wrote bootstrap configuration to {}", path.display()),
            Ok(false) => {}
            Err(err) => {
                return Err(AvirtError::InvalidConfig(format!(
                    "{} is missing and could not be created: {err}",
                    path.display()
                )))
            }
        }
        Self::load(path)
    }

    /// Read a config file from disk and detect its format by extension.
    pub fn load<P: AsRef<Path>>(path: P) -> AvirtResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let format = if matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml")
        ) {
            ConfigFormat::Yaml
        } else {
            ConfigFormat::Toml
        };

        let mut cfg = Self::parse(&contents, format)?;
        cfg.path = path.to_path_buf();
        Ok(cfg)
    }

    pub fn parse(contents: &str, format: ConfigFormat) -> AvirtResult<Self> {
        let mut cfg = match format {
            ConfigFormat::Toml => toml::from_str::<Self>(contents)?,
            ConfigFormat::Yaml => serde_yaml::from_str::<Self>(contents)?,
        };
        cfg.format = format;

        if cfg.control.card_id.trim().is_empty() {
            return Err(AvirtError::InvalidConfig(
                "control.card_id must not be empty".to_string(),
            ));
        }

        Ok(cfg)
    }

    /// Perform a best-effort validation pass and return human-readable issues.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.configfs.mount_point.is_absolute() {
            issues.push(format!(
                "configfs.mount_point must be an absolute path (got {})",
                self.configfs.mount_point.display()
            ));
        }
        if let Some(path) = &self.configfs.mounts_path {
            if !path.is_absolute() {
                issues.push(format!(
                    "configfs.mounts_path must be an absolute path (got {})",
                    path.display()
                ));
            }
        }
        if self.control.card_id.trim().is_empty() {
            issues.push("control.card_id must not be empty".to_string());
        }

        let mut seen = HashSet::new();
        for stream in &self.streams {
            if let Err(err) = stream.validate() {
                issues.push(format!("streams: {err}"));
            }
            if !seen.insert(stream.dir_name()) {
                issues.push(format!(
                    "duplicate {} stream entry detected: {}",
                    stream.direction, stream.name
                ));
            }
        }

        issues
    }

    /// Find a configured stream by name and direction.
    pub fn stream(&self, name: &str, direction: StreamDirection) -> Option<&StreamSpec> {
        self.streams
            .iter()
            .find(|stream| stream.name == name && stream.direction == direction)
    }

    /// Persist the configuration back to its original on-disk format.
    pub fn save(&self) -> AvirtResult<()> {
        let payload = match self.format {
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
            ConfigFormat::Yaml => serde_yaml::to_string(self)?,
        };
        fs::write(&self.path, payload)?;
        Ok(())
    }
}

/// Returns whether the template was written.
fn write_template_if_missing(path: &Path) -> io::Result<bool> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o644)
        .open(path)
    {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(err) => return Err(err),
    };
    file.write_all(BOOTSTRAP_TEMPLATE.as_bytes())?;
    Ok(true)
}
