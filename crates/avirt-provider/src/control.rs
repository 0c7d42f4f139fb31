//! Provider contract for the ALSA control interface.
//!
//! Once the configuration is sealed the kernel registers a regular ALSA card.
//! Everything the toolkit needs to know about it afterwards comes through the
//! control device of that card, so the lookups are modelled here and the ioctl
//! plumbing lives in `avirt-alsa`.

use crate::pcm::StreamDirection;
use log::debug;
use serde::Serialize;
use std::error::Error;

/// Decoded `struct snd_ctl_card_info`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CardInfo {
    /// Card index (the `N` of `controlC<N>`).
    pub card: i32,
    pub id: String,
    pub driver: String,
    pub name: String,
    pub longname: String,
    pub mixername: String,
    pub components: String,
}

impl CardInfo {
    /// True when `needle` names this card by id or driver.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim();
        !needle.is_empty()
            && (self.id.eq_ignore_ascii_case(needle) || self.driver.eq_ignore_ascii_case(needle))
    }
}

/// Decoded `struct snd_pcm_info` for one direction of a PCM device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PcmInfo {
    pub card: i32,
    pub device: u32,
    pub subdevice: u32,
    pub direction: StreamDirection,
    pub id: String,
    pub name: String,
    pub subname: String,
    pub subdevices_count: u32,
    pub subdevices_avail: u32,
}

/// Abstraction over sound-card control queries.
pub trait ControlProvider {
    type Error: Error + Send + Sync + 'static;

    /// Indices of every card that exposes a control device, ascending.
    fn card_indices(&self) -> Result<Vec<i32>, Self::Error>;

    /// Query card information for `card`.
    fn card_info(&self, card: i32) -> Result<CardInfo, Self::Error>;

    /// Return every PCM device/direction pair registered on `card`.
    fn pcm_devices(&self, card: i32) -> Result<Vec<PcmInfo>, Self::Error>;

    /// Scan cards in index order and return the first whose id or driver matches `needle`.
    ///
    /// Cards that cannot be queried are skipped. An error is returned only
    /// when every card failed, since nothing could then be ruled out.
    fn find_card(&self, needle: &str) -> Result<Option<CardInfo>, Self::Error> {
        let mut last_err = None;
        let mut answered = 0usize;
        for card in self.card_indices()? {
            match self.card_info(card) {
                Ok(info) if info.matches(needle) => return Ok(Some(info)),
                Ok(_) => answered += 1,
                Err(err) => {
                    debug!("skipping card {card} while looking for `{needle}`: {err}");
                    last_err = Some(err);
                }
            }
        }
        match last_err {
            Some(err) if answered == 0 => Err(err),
            _ => Ok(None),
        }
    }
}
