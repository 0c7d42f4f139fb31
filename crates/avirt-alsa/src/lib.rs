//! ALSA control-device integration for AVIRT.
//!
//! `system` implements `ControlProvider` over `/dev/snd/controlC<N>`. `ioctl`
//! isolates the raw requests and struct layouts so the provider stays readable.

mod ioctl;
mod system;

pub use system::{parse_control_name, SystemControlProvider, DEFAULT_DEV_DIR};
