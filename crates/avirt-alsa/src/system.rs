//! System-backed `ControlProvider` implementation.
//!
//! Cards are discovered by listing `controlC<N>` nodes in the ALSA device
//! directory; everything else is asked of the control device itself.

use crate::ioctl::ControlDevice;
use avirt_core::error::{AvirtError, AvirtResult};
use avirt_core::AvirtConfig;
use avirt_provider::{CardInfo, ControlProvider, PcmInfo, StreamDirection};
use log::debug;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_DEV_DIR: &str = "/dev/snd";
const CONTROL_PREFIX: &str = "controlC";

/// Queries sound cards through `/dev/snd/controlC<N>`.
#[derive(Debug, Clone)]
pub struct SystemControlProvider {
    dev_dir: PathBuf,
}

impl Default for SystemControlProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DEV_DIR)
    }
}

impl SystemControlProvider {
    pub fn new(dev_dir: impl Into<PathBuf>) -> Self {
        Self {
            dev_dir: dev_dir.into(),
        }
    }

    pub fn from_config(config: &AvirtConfig) -> Self {
        Self::new(&config.control.dev_dir)
    }

    pub fn control_path(&self, card: i32) -> PathBuf {
        self.dev_dir.join(format!("{CONTROL_PREFIX}{card}"))
    }

    fn open(&self, card: i32) -> AvirtResult<ControlDevice> {
        ControlDevice::open(&self.control_path(card))
    }
}

impl ControlProvider for SystemControlProvider {
    type Error = AvirtError;

    fn card_indices(&self) -> AvirtResult<Vec<i32>> {
        let reader = fs::read_dir(&self.dev_dir).map_err(|err| {
            AvirtError::control(format!("list {}", self.dev_dir.display()), err)
        })?;

        let mut cards = Vec::new();
        for entry in reader {
            let entry = entry?;
            let name = entry.file_name();
            match name.to_str().and_then(parse_control_name) {
                Some(card) => cards.push(card),
                None => debug!("skipping {} while scanning controls", entry.path().display()),
            }
        }
        cards.sort_unstable();
        cards.dedup();
        Ok(cards)
    }

    fn card_info(&self, card: i32) -> AvirtResult<CardInfo> {
        self.open(card)?.card_info()
    }

    fn pcm_devices(&self, card: i32) -> AvirtResult<Vec<PcmInfo>> {
        let control = self.open(card)?;
        let mut devices = Vec::new();
        let mut current = -1;

        loop {
            let next = control.next_pcm_device(current)?;
            if next < 0 || next <= current {
                break;
            }
            for direction in StreamDirection::ALL {
                if let Some(info) = control.pcm_info(next as u32, direction)? {
                    devices.push(info);
                }
            }
            current = next;
        }

        Ok(devices)
    }
}

/// Parse `controlC<N>` into `N`.
pub fn parse_control_name(name: &str) -> Option<i32> {
    let digits = name.strip_prefix(CONTROL_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
