//! Raw ALSA control ioctls.
//!
//! Only the three requests the toolkit needs are modelled. Struct layouts
//! mirror `<sound/asound.h>`; the size assertions below pin them.

use avirt_core::error::{AvirtError, AvirtResult};
use avirt_provider::{CardInfo, PcmInfo, StreamDirection};
use std::fs::File;
use std::io;
use std::mem::{size_of, zeroed};
use std::os::raw::{c_int, c_uint};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

#[repr(C)]
#[allow(dead_code)]
pub(crate) struct SndCtlCardInfo {
    card: c_int,
    pad: c_int,
    id: [u8; 16],
    driver: [u8; 16],
    name: [u8; 32],
    longname: [u8; 80],
    reserved_: [u8; 16],
    mixername: [u8; 80],
    components: [u8; 128],
}

#[repr(C)]
#[allow(dead_code)]
pub(crate) struct SndPcmInfo {
    device: c_uint,
    subdevice: c_uint,
    stream: c_int,
    card: c_int,
    id: [u8; 64],
    name: [u8; 80],
    subname: [u8; 32],
    dev_class: c_int,
    dev_subclass: c_int,
    subdevices_count: c_uint,
    subdevices_avail: c_uint,
    sync: [u32; 4],
    reserved: [u8; 64],
}

const _: () = assert!(size_of::<SndCtlCardInfo>() == 376);
const _: () = assert!(size_of::<SndPcmInfo>() == 288);

// Generic `_IOC` encoding (x86, arm, riscv).
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;
const SND_CTL_IOCTL_TYPE: u32 = b'U' as u32;

const fn ioc(dir: u32, nr: u32, size: usize) -> u32 {
    (dir << 30) | ((size as u32) << 16) | (SND_CTL_IOCTL_TYPE << 8) | nr
}

pub(crate) const SNDRV_CTL_IOCTL_CARD_INFO: u32 =
    ioc(IOC_READ, 0x01, size_of::<SndCtlCardInfo>());
pub(crate) const SNDRV_CTL_IOCTL_PCM_NEXT_DEVICE: u32 = ioc(IOC_READ, 0x30, size_of::<c_int>());
pub(crate) const SNDRV_CTL_IOCTL_PCM_INFO: u32 =
    ioc(IOC_READ | IOC_WRITE, 0x31, size_of::<SndPcmInfo>());

/// An open `/dev/snd/controlC<N>` device.
#[derive(Debug)]
pub(crate) struct ControlDevice {
    file: File,
    path: PathBuf,
}

impl ControlDevice {
    pub(crate) fn open(path: &Path) -> AvirtResult<Self> {
        let file = File::open(path)
            .map_err(|err| AvirtError::control(format!("open {}", path.display()), err))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn card_info(&self) -> AvirtResult<CardInfo> {
        let mut raw: SndCtlCardInfo = unsafe { zeroed() };
        self.ioctl(SNDRV_CTL_IOCTL_CARD_INFO, &mut raw, "SNDRV_CTL_IOCTL_CARD_INFO")?;
        Ok(CardInfo {
            card: raw.card,
            id: c_string(&raw.id),
            driver: c_string(&raw.driver),
            name: c_string(&raw.name),
            longname: c_string(&raw.longname),
            mixername: c_string(&raw.mixername),
            components: c_string(&raw.components),
        })
    }

    /// Next PCM device after `current` (-1 starts the scan); -1 means no more.
    pub(crate) fn next_pcm_device(&self, current: i32) -> AvirtResult<i32> {
        let mut device: c_int = current;
        self.ioctl(
            SNDRV_CTL_IOCTL_PCM_NEXT_DEVICE,
            &mut device,
            "SNDRV_CTL_IOCTL_PCM_NEXT_DEVICE",
        )?;
        Ok(device)
    }

    /// PCM info for `device` in `direction`; `None` when the device has no such stream.
    pub(crate) fn pcm_info(
        &self,
        device: u32,
        direction: StreamDirection,
    ) -> AvirtResult<Option<PcmInfo>> {
        let mut raw: SndPcmInfo = unsafe { zeroed() };
        raw.device = device;
        raw.subdevice = 0;
        raw.stream = direction.as_raw();

        match self.raw_ioctl(SNDRV_CTL_IOCTL_PCM_INFO, &mut raw) {
            Ok(()) => {}
            Err(err) if err.raw_os_error() == Some(libc::ENOENT) => return Ok(None),
            Err(err) => {
                return Err(AvirtError::control(
                    format!(
                        "SNDRV_CTL_IOCTL_PCM_INFO device {device} {direction} on {}",
                        self.path.display()
                    ),
                    err,
                ))
            }
        }

        Ok(Some(PcmInfo {
            card: raw.card,
            device: raw.device,
            subdevice: raw.subdevice,
            direction: StreamDirection::try_from(raw.stream).unwrap_or(direction),
            id: c_string(&raw.id),
            name: c_string(&raw.name),
            subname: c_string(&raw.subname),
            subdevices_count: raw.subdevices_count,
            subdevices_avail: raw.subdevices_avail,
        }))
    }

    fn ioctl<T>(&self, request: u32, arg: &mut T, name: &str) -> AvirtResult<()> {
        self.raw_ioctl(request, arg)
            .map_err(|err| AvirtError::control(format!("{name} on {}", self.path.display()), err))
    }

    /// `arg` must be the `#[repr(C)]` type the request encodes.
    fn raw_ioctl<T>(&self, request: u32, arg: &mut T) -> io::Result<()> {
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), request as _, arg as *mut T) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// Decode a fixed-width, NUL-padded C string.
pub(crate) fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_codes_match_asound_h() {
        assert_eq!(SNDRV_CTL_IOCTL_CARD_INFO, 0x8178_5501);
        assert_eq!(SNDRV_CTL_IOCTL_PCM_NEXT_DEVICE, 0x8004_5530);
        assert_eq!(SNDRV_CTL_IOCTL_PCM_INFO, 0xC120_5531);
    }

    #[test]
    fn c_string_stops_at_nul() {
        let mut raw = [0u8; 16];
        raw[..5].copy_from_slice(b"avirt");
        assert_eq!(c_string(&raw), "avirt");
        assert_eq!(c_string(b"full-width"), "full-width");
        assert_eq!(c_string(&[0u8; 4]), "");
    }
}
