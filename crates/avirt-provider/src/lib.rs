#![forbid(unsafe_code)]

//! Provider contracts shared across the AVIRT toolkit.
//!
//! Stream direction and control-device descriptors live here so the core crate
//! can drive the configuration lifecycle without depending on the ioctl layer.

pub mod control;
pub mod pcm;

pub use control::{CardInfo, ControlProvider, PcmInfo};
pub use pcm::{ParseDirectionError, StreamDirection};
