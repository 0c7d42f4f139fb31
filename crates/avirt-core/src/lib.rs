//! Core building blocks shared by the AVIRT tools.
//!
//! Configuration, the configfs layout, and the configuration lifecycle of the
//! virtual card live here so the binaries only deal with presentation.

pub mod config;
pub mod configfs;
pub mod error;
pub mod logging;
pub mod mounts;
pub mod session;
pub mod stream;
pub mod workflow;

pub use config::{AvirtConfig, ConfigFormat, ConfigfsCfg, ControlCfg};
pub use configfs::{ConfigfsLayout, Mounter, StreamEntry, SystemMounter};
pub use error::{AvirtError, AvirtResult};
pub use session::{AvirtSession, SessionStatus};
pub use stream::StreamSpec;
