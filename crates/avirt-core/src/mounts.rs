//! Mount-table inspection used to detect an existing configfs mount.

use crate::error::{AvirtError, AvirtResult};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const MOUNTS_OVERRIDE_ENV: &str = "AVIRT_MOUNTS_PATH";
pub const DEFAULT_MOUNTS_PATH: &str = "/proc/mounts";
pub const CONFIGFS_FSTYPE: &str = "configfs";

/// One parsed line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mountpoint: PathBuf,
    pub fstype: String,
}

/// Read the mount table, honouring `AVIRT_MOUNTS_PATH` before `configured`.
pub fn read_mount_table(configured: Option<&Path>) -> AvirtResult<String> {
    let path = match env::var(MOUNTS_OVERRIDE_ENV) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => configured
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MOUNTS_PATH)),
    };
    fs::read_to_string(&path).map_err(|source| AvirtError::Configfs { path, source })
}

/// Locate a configfs mount point in the current mount table, preferring `preferred`.
pub fn find_configfs_mount(
    table_path: Option<&Path>,
    preferred: &Path,
) -> AvirtResult<Option<PathBuf>> {
    let table = read_mount_table(table_path)?;
    Ok(select_configfs_mount(&table, preferred))
}

pub fn select_configfs_mount(table: &str, preferred: &Path) -> Option<PathBuf> {
    let candidates: Vec<PathBuf> = parse_mounts(table)
        .into_iter()
        .filter(|entry| entry.fstype == CONFIGFS_FSTYPE)
        .map(|entry| entry.mountpoint)
        .collect();
    if candidates.iter().any(|mountpoint| mountpoint == preferred) {
        return Some(preferred.to_path_buf());
    }
    candidates.into_iter().next()
}

pub fn parse_mounts(table: &str) -> Vec<MountEntry> {
    let mut entries = Vec::new();
    for line in table.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(device), Some(mountpoint), Some(fstype)) =
            (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        entries.push(MountEntry {
            device: device.to_string(),
            mountpoint: PathBuf::from(unescape_mount_field(mountpoint)),
            fstype: fstype.to_string(),
        });
    }
    entries
}

fn unescape_mount_field(input: &str) -> String {
    let mut chars = input.chars().peekable();
    let mut output = String::with_capacity(input.len());

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            let mut oct = String::new();
            for _ in 0..3 {
                match chars.peek() {
                    Some(next) if next.is_digit(8) => {
                        oct.push(*next);
                        chars.next();
                    }
                    _ => break,
                }
            }
            if oct.len() == 3 {
                if let Ok(value) = u8::from_str_radix(&oct, 8) {
                    output.push(value as char);
                    continue;
                }
            }
            output.push('\\');
            output.push_str(&oct);
        } else {
            output.push(ch);
        }
    }

    output
}
