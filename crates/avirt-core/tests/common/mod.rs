#![allow(dead_code)]

use avirt_core::config::{AvirtConfig, ConfigfsCfg, ControlCfg};
use avirt_core::configfs::{ConfigfsLayout, Mounter};
use avirt_core::error::{AvirtError, AvirtResult};
use avirt_provider::{CardInfo, ControlProvider, PcmInfo, StreamDirection};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Temporary configfs root plus a private mount table.
pub struct Fixture {
    pub dir: TempDir,
    pub mount_point: PathBuf,
    pub mounts_path: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mount_point = dir.path().join("config");
        let mounts_path = dir.path().join("mounts");
        fs::write(&mounts_path, "proc /proc proc rw 0 0\n").unwrap();
        Self {
            dir,
            mount_point,
            mounts_path,
        }
    }

    /// Move the mount point deep enough that `<mount>/<tail>` is exactly
    /// `total_len` bytes long.
    pub fn nest_mount_point(&mut self, tail: &str, total_len: usize) {
        let target = total_len - tail.len() - 1;
        let mut path = self.dir.path().to_string_lossy().into_owned();
        while target - path.len() > 201 {
            path.push('/');
            path.push_str(&"d".repeat(100));
        }
        let last = target - path.len() - 1;
        path.push('/');
        path.push_str(&"d".repeat(last));
        self.mount_point = PathBuf::from(path);
    }

    pub fn config(&self) -> AvirtConfig {
        AvirtConfig {
            configfs: ConfigfsCfg {
                mount_point: self.mount_point.clone(),
                auto_mount: true,
                mounts_path: Some(self.mounts_path.clone()),
            },
            control: ControlCfg {
                dev_dir: self.dir.path().join("snd"),
                card_id: "avirt".into(),
            },
            ..AvirtConfig::default()
        }
    }

    pub fn layout(&self) -> ConfigfsLayout {
        ConfigfsLayout::new(&self.mount_point)
    }

    /// Pretend configfs is mounted and the driver tree is populated.
    pub fn premount(&self) {
        populate_driver_tree(&self.mount_point);
        append_mount(&self.mounts_path, &self.mount_point);
    }
}

fn populate_driver_tree(root: &Path) {
    let layout = ConfigfsLayout::new(root);
    fs::create_dir_all(layout.streams_dir()).unwrap();
    fs::write(layout.sealed_path(), "0\n").unwrap();
}

fn append_mount(table: &Path, mount_point: &Path) {
    let mut file = OpenOptions::new().append(true).open(table).unwrap();
    writeln!(file, "none {} configfs rw,relatime 0 0", mount_point.display()).unwrap();
}

/// Mounter that simulates configfs on a temporary directory.
#[derive(Clone)]
pub struct MockMounter {
    table: PathBuf,
    fail_with: Option<i32>,
    pub calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockMounter {
    pub fn new(fixture: &Fixture) -> Self {
        Self {
            table: fixture.mounts_path.clone(),
            fail_with: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(fixture: &Fixture, errno: i32) -> Self {
        Self {
            fail_with: Some(errno),
            ..Self::new(fixture)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Mounter for MockMounter {
    fn mount_configfs(&self, target: &Path) -> AvirtResult<()> {
        self.calls.lock().unwrap().push(target.to_path_buf());
        if let Some(errno) = self.fail_with {
            return Err(AvirtError::Mount {
                target: target.to_path_buf(),
                source: io::Error::from_raw_os_error(errno),
            });
        }
        populate_driver_tree(target);
        append_mount(&self.table, target);
        Ok(())
    }
}

/// Control provider backed by fixed card and PCM tables.
#[derive(Clone, Default)]
pub struct MockControl {
    cards: Vec<CardInfo>,
    pcms: Vec<PcmInfo>,
    pub info_queries: Arc<Mutex<usize>>,
}

impl MockControl {
    pub fn with_cards(ids: &[(i32, &str)]) -> Self {
        Self {
            cards: ids
                .iter()
                .map(|(card, id)| CardInfo {
                    card: *card,
                    id: id.to_string(),
                    driver: id.to_string(),
                    name: format!("{id} card"),
                    ..CardInfo::default()
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_pcm(
        mut self,
        card: i32,
        device: u32,
        direction: StreamDirection,
        name: &str,
    ) -> Self {
        self.pcms.push(PcmInfo {
            card,
            device,
            direction,
            id: name.to_string(),
            name: name.to_string(),
            subdevices_count: 1,
            subdevices_avail: 1,
            ..PcmInfo::default()
        });
        self
    }

    pub fn queries(&self) -> usize {
        *self.info_queries.lock().unwrap()
    }
}

impl ControlProvider for MockControl {
    type Error = AvirtError;

    fn card_indices(&self) -> AvirtResult<Vec<i32>> {
        Ok(self.cards.iter().map(|card| card.card).collect())
    }

    fn card_info(&self, card: i32) -> AvirtResult<CardInfo> {
        *self.info_queries.lock().unwrap() += 1;
        self.cards
            .iter()
            .find(|info| info.card == card)
            .cloned()
            .ok_or_else(|| AvirtError::Control {
                message: format!("no control device for card {card}"),
                errno: libc::ENODEV,
            })
    }

    fn pcm_devices(&self, card: i32) -> AvirtResult<Vec<PcmInfo>> {
        Ok(self
            .pcms
            .iter()
            .filter(|pcm| pcm.card == card)
            .cloned()
            .collect())
    }
}
