//! Configuration lifecycle of the virtual card.
//!
//! A session starts unsealed with configfs possibly unmounted. Streams may be
//! added until the card is sealed; after that the kernel has registered the
//! card and the session can only query it. configfs is mounted on demand, at
//! most once per session.

use crate::config::AvirtConfig;
use crate::configfs::{write_attribute, ConfigfsLayout, Mounter, StreamEntry, SystemMounter};
use crate::configfs::{CHANNELS_ATTR, MAP_ATTR};
use crate::error::{AvirtError, AvirtResult};
use crate::mounts;
use crate::stream::StreamSpec;
use avirt_provider::{CardInfo, ControlProvider, PcmInfo, StreamDirection};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Snapshot returned by [`AvirtSession::status`].
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub mounted: bool,
    pub configfs_root: Option<PathBuf>,
    pub sealed: bool,
    pub streams: Vec<StreamEntry>,
    pub card_index: Option<i32>,
}

pub struct AvirtSession<C, M = SystemMounter> {
    config: Arc<AvirtConfig>,
    control: C,
    mounter: M,
    layout: ConfigfsLayout,
    configfs_mounted: bool,
    card_sealed: bool,
    card_index: Option<i32>,
}

impl<C> AvirtSession<C, SystemMounter>
where
    C: ControlProvider<Error = AvirtError>,
{
    pub fn new(config: Arc<AvirtConfig>, control: C) -> Self {
        Self::with_mounter(config, control, SystemMounter)
    }
}

impl<C, M> AvirtSession<C, M>
where
    C: ControlProvider<Error = AvirtError>,
    M: Mounter,
{
    pub fn with_mounter(config: Arc<AvirtConfig>, control: C, mounter: M) -> Self {
        let layout = ConfigfsLayout::new(&config.configfs.mount_point);
        Self {
            config,
            control,
            mounter,
            layout,
            configfs_mounted: false,
            card_sealed: false,
            card_index: None,
        }
    }

    pub fn config(&self) -> &AvirtConfig {
        &self.config
    }

    pub fn layout(&self) -> &ConfigfsLayout {
        &self.layout
    }

    pub fn is_mounted(&self) -> bool {
        self.configfs_mounted
    }

    /// Sealed state as last observed by this session.
    pub fn is_sealed(&self) -> bool {
        self.card_sealed
    }

    /// Adopt an existing configfs mount if the mount table lists one.
    pub fn detect_mount(&mut self) -> bool {
        if self.configfs_mounted {
            return true;
        }

        let configfs = &self.config.configfs;
        match mounts::find_configfs_mount(configfs.mounts_path.as_deref(), &configfs.mount_point) {
            Ok(Some(mountpoint)) => {
                debug!("configfs already mounted at {}", mountpoint.display());
                self.layout = ConfigfsLayout::new(mountpoint);
                self.configfs_mounted = true;
            }
            Ok(None) => debug!("no configfs mount found in mount table"),
            Err(err) => warn!("unable to inspect mount table: {err}"),
        }
        self.configfs_mounted
    }

    /// Make sure configfs is mounted, mounting it when allowed.
    pub fn ensure_mounted(&mut self) -> AvirtResult<()> {
        if self.detect_mount() {
            return Ok(());
        }

        let target = self.config.configfs.mount_point.clone();
        if !self.config.configfs.auto_mount {
            return Err(AvirtError::NotMounted(format!(
                "no configfs mount detected and configfs.auto_mount is disabled (expected {})",
                target.display()
            )));
        }

        if let Err(err) = self.mounter.mount_configfs(&target) {
            error!("failed to mount configfs filesystem: {err}");
            return Err(err);
        }

        info!("mounted configfs at {}", target.display());
        self.layout = ConfigfsLayout::new(target);
        self.configfs_mounted = true;
        Ok(())
    }

    /// Refresh the sealed flag from configfs. Once sealed, it stays sealed.
    ///
    /// Reads the `sealed` attribute under the current layout, so callers
    /// that need the on-disk state mount first.
    pub fn refresh_sealed(&mut self) -> AvirtResult<bool> {
        if !self.card_sealed && self.layout.read_sealed()? {
            debug!(
                "card already sealed according to {}",
                self.layout.sealed_path().display()
            );
            self.card_sealed = true;
        }
        Ok(self.card_sealed)
    }

    /// Create a stream from the raw `(name, channels, direction, map)` tuple.
    ///
    /// `direction` uses the ALSA numbering (0 playback, 1 capture); anything
    /// else is rejected with `InvalidDirection`.
    pub fn stream_new_raw(
        &mut self,
        name: &str,
        channels: u32,
        direction: i32,
        map: Option<&str>,
    ) -> AvirtResult<PathBuf> {
        let spec = StreamSpec::from_raw(name, channels, direction, map)?;
        self.create_stream(&spec)
    }

    pub fn stream_new(
        &mut self,
        name: &str,
        channels: u32,
        direction: StreamDirection,
        map: Option<&str>,
    ) -> AvirtResult<PathBuf> {
        let mut spec = StreamSpec::new(name, channels, direction);
        spec.map = map.map(str::to_string);
        self.create_stream(&spec)
    }

    /// Create the configfs directory for `spec` and write its attributes.
    ///
    /// Returns the stream directory. If an attribute write fails, the
    /// directory created here is removed again before the error is returned.
    pub fn create_stream(&mut self, spec: &StreamSpec) -> AvirtResult<PathBuf> {
        if let Err(err) = spec.validate() {
            error!("cannot create stream '{}': {err}", spec.name);
            return Err(err);
        }

        self.ensure_mounted()?;

        if self.refresh_sealed()? {
            error!(
                "cannot create stream '{}': card is already sealed",
                spec.name
            );
            return Err(AvirtError::Sealed);
        }

        let path = match self.layout.create_stream_dir(spec) {
            Ok(path) => path,
            Err(err) => {
                error!(
                    "cannot create stream '{}' at directory '{}': {err}",
                    spec.name,
                    self.layout.stream_dir(spec).display()
                );
                return Err(err);
            }
        };

        if let Err(err) = write_stream_attributes(&path, spec) {
            error!("failed to configure stream '{}': {err}", spec.name);
            self.layout.remove_stream_dir(spec);
            return Err(err);
        }

        info!(
            "created {} stream '{}' ({} channels{})",
            spec.direction,
            spec.name,
            spec.channels,
            spec.effective_map()
                .map(|map| format!(", map {map}"))
                .unwrap_or_default()
        );
        Ok(path)
    }

    /// Seal the card so the driver registers it. No streams may be added afterwards.
    pub fn card_seal(&mut self) -> AvirtResult<()> {
        self.ensure_mounted()?;

        if self.refresh_sealed()? {
            warn!("card is already sealed");
            return Err(AvirtError::AlreadySealed);
        }

        if let Err(err) = self.layout.write_sealed() {
            error!("failed to seal card: {err}");
            return Err(err);
        }

        self.card_sealed = true;
        self.card_index = None;
        info!("sealed card via {}", self.layout.sealed_path().display());
        Ok(())
    }

    /// Index of the registered card, looked up once and cached.
    pub fn card_index(&mut self) -> AvirtResult<i32> {
        if let Some(index) = self.card_index {
            return Ok(index);
        }

        if !self.card_sealed {
            self.ensure_mounted()?;
            if !self.refresh_sealed()? {
                return Err(AvirtError::NotSealed);
            }
        }

        let card_id = self.config.control.card_id.as_str();
        let info = self
            .control
            .find_card(card_id)?
            .ok_or_else(|| AvirtError::CardNotFound(card_id.to_string()))?;
        debug!("card `{card_id}` registered as index {}", info.card);
        self.card_index = Some(info.card);
        Ok(info.card)
    }

    pub fn card_info(&mut self) -> AvirtResult<CardInfo> {
        let index = self.card_index()?;
        self.control.card_info(index)
    }

    /// Resolve the PCM device backing stream `name` by scanning the card's devices.
    pub fn pcm_device(&mut self, name: &str, direction: StreamDirection) -> AvirtResult<PcmInfo> {
        let index = self.card_index()?;
        self.control
            .pcm_devices(index)?
            .into_iter()
            .find(|pcm| pcm.direction == direction && (pcm.name == name || pcm.id == name))
            .ok_or_else(|| AvirtError::PcmNotFound(format!("{direction} {name}")))
    }

    /// Report the lifecycle state without mounting anything.
    pub fn status(&mut self) -> AvirtResult<SessionStatus> {
        if !self.detect_mount() {
            return Ok(SessionStatus {
                mounted: false,
                configfs_root: None,
                sealed: self.card_sealed,
                streams: Vec::new(),
                card_index: self.card_index,
            });
        }

        let sealed = self.refresh_sealed()?;
        let streams = self.layout.list_streams()?;
        let card_index = if sealed {
            match self.card_index() {
                Ok(index) => Some(index),
                Err(err) => {
                    debug!("card index unavailable: {err}");
                    None
                }
            }
        } else {
            None
        };

        Ok(SessionStatus {
            mounted: true,
            configfs_root: Some(self.layout.root().to_path_buf()),
            sealed,
            streams,
            card_index,
        })
    }
}

fn write_stream_attributes(dir: &Path, spec: &StreamSpec) -> AvirtResult<()> {
    write_attribute(&dir.join(CHANNELS_ATTR), &spec.channels.to_string())?;
    if let Some(map) = spec.effective_map() {
        write_attribute(&dir.join(MAP_ATTR), map)?;
    }
    Ok(())
}
