//! Error taxonomy shared by every AVIRT crate.
//!
//! The kernel-facing contract is "negative errno on failure"; `AvirtError::errno`
//! keeps that mapping available for callers that still speak it.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type AvirtResult<T> = Result<T, AvirtError>;

#[derive(Debug, Error)]
pub enum AvirtError {
    #[error("invalid stream direction {0} (expected 0 for playback or 1 for capture)")]
    InvalidDirection(i32),

    #[error("invalid stream `{name}`: {reason}")]
    InvalidStream { name: String, reason: String },

    #[error("cannot create stream `{name}` since name is too long (directory name limit {max} bytes)")]
    NameTooLong { name: String, max: usize },

    #[error("card is sealed; no more streams may be created")]
    Sealed,

    #[error("card is already sealed")]
    AlreadySealed,

    #[error("card is not sealed yet; seal the configuration before querying the card")]
    NotSealed,

    #[error("configfs is not mounted: {0}")]
    NotMounted(String),

    #[error("stream already exists at {}", .0.display())]
    StreamExists(PathBuf),

    #[error("failed to mount configfs at {}: {source}", target.display())]
    Mount {
        target: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configfs access failed at {}: {source}", path.display())]
    Configfs {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("control interface error: {message}")]
    Control { message: String, errno: i32 },

    #[error("no registered sound card matches `{0}`")]
    CardNotFound(String),

    #[error("no PCM device named `{0}`")]
    PcmNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl AvirtError {
    /// Build a `Control` error from an OS error, keeping its errno.
    pub fn control(context: impl Into<String>, err: io::Error) -> Self {
        let errno = err.raw_os_error().unwrap_or(libc::EIO);
        AvirtError::Control {
            message: format!("{}: {err}", context.into()),
            errno,
        }
    }

    /// Negative errno equivalent of this error.
    pub fn errno(&self) -> i32 {
        let positive = match self {
            AvirtError::InvalidDirection(_)
            | AvirtError::InvalidStream { .. }
            | AvirtError::InvalidConfig(_)
            | AvirtError::Toml(_)
            | AvirtError::TomlSer(_)
            | AvirtError::Yaml(_) => libc::EINVAL,
            AvirtError::NameTooLong { .. } => libc::ENOMEM,
            AvirtError::Sealed | AvirtError::AlreadySealed => libc::EPERM,
            AvirtError::NotSealed | AvirtError::NotMounted(_) | AvirtError::CardNotFound(_) => {
                libc::ENODEV
            }
            AvirtError::StreamExists(_) => libc::EEXIST,
            AvirtError::PcmNotFound(_) => libc::ENOENT,
            AvirtError::Control { errno, .. } => *errno,
            AvirtError::Mount { source, .. } | AvirtError::Configfs { source, .. } => {
                source.raw_os_error().unwrap_or(libc::EIO)
            }
            AvirtError::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
        };
        -positive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping_is_negative() {
        assert_eq!(AvirtError::Sealed.errno(), -libc::EPERM);
        assert_eq!(AvirtError::InvalidDirection(7).errno(), -libc::EINVAL);
        assert_eq!(
            AvirtError::NameTooLong {
                name: "x".into(),
                max: 1
            }
            .errno(),
            -libc::ENOMEM
        );
        assert_eq!(
            AvirtError::StreamExists(PathBuf::from("/config/snd-avirt/streams/playback_a"))
                .errno(),
            -libc::EEXIST
        );
    }

    #[test]
    fn os_errors_keep_their_errno() {
        let err = AvirtError::Mount {
            target: PathBuf::from("/config"),
            source: io::Error::from_raw_os_error(libc::EBUSY),
        };
        assert_eq!(err.errno(), -libc::EBUSY);

        let err = AvirtError::control(
            "open /dev/snd/controlC0",
            io::Error::from_raw_os_error(libc::EACCES),
        );
        assert_eq!(err.errno(), -libc::EACCES);
        assert!(err.to_string().contains("controlC0"));

        let err = AvirtError::Io(io::Error::new(io::ErrorKind::Other, "synthetic"));
        assert_eq!(err.errno(), -libc::EIO);
    }
}
