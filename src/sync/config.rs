// Copyright (c) 2024 Mike Tsao. All rights reserved.

use crate::record::{Record, RecordSerializable};
use app_dirs2::{AppDataType, AppInfo};
use std::{
    collections::HashMap,
    fs::File,
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

/// Where the last successful updates check is remembered.
pub const LAST_UPDATES_INFO_KEY: &str = "last-updates-info";

const APP_INFO: AppInfo = AppInfo {
    name: "Ensnare",
    author: "Ensnare",
};

/// Keyed persistent storage for [Record]s.
pub trait ConfigStore: Send + core::fmt::Debug {
    /// The record stored under `key`, or `None` on first run.
    fn load_record(&self, key: &str) -> anyhow::Result<Option<Record>>;

    /// Stores `record` under `key`, replacing what was there.
    fn save_record(&self, key: &str, record: Record) -> anyhow::Result<()>;

    /// Resets `target`, then fills it from the record stored under `key`, if
    /// there is one.
    fn load(&self, target: &mut dyn RecordSerializable, key: &str) -> anyhow::Result<()> {
        target.reset();
        if let Some(record) = self.load_record(key)? {
            target.deserialize(&record);
        }
        Ok(())
    }

    /// Stores `source` under `key`.
    fn save(&self, source: &dyn RecordSerializable, key: &str) -> anyhow::Result<()> {
        self.save_record(key, source.serialize())
    }
}

/// A [ConfigStore] that lives only as long as the process. Clones share
/// storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryConfigStore {
    records: Arc<Mutex<HashMap<String, Record>>>,
}
impl ConfigStore for MemoryConfigStore {
    fn load_record(&self, key: &str) -> anyhow::Result<Option<Record>> {
        let records = self
            .records
            .lock()
            .map_err(|_| anyhow::format_err!("Config store is poisoned"))?;
        Ok(records.get(key).cloned())
    }

    fn save_record(&self, key: &str, record: Record) -> anyhow::Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow::format_err!("Config store is poisoned"))?
            .insert(key.to_string(), record);
        Ok(())
    }
}

/// A [ConfigStore] that keeps each key in its own JSON file inside a
/// directory.
#[derive(Debug)]
pub struct FileConfigStore {
    dir: PathBuf,
}
impl FileConfigStore {
    /// Stores files in `dir`, which is created on first save.
    pub fn new_with(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// The per-user configuration directory for this app.
    pub fn default_location() -> anyhow::Result<Self> {
        let dir = app_dirs2::app_root(AppDataType::UserConfig, &APP_INFO)
            .map_err(|e| anyhow::format_err!("Couldn't find a config directory: {}", e))?;
        Ok(Self::new_with(&dir))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}
impl ConfigStore for FileConfigStore {
    fn load_record(&self, key: &str) -> anyhow::Result<Option<Record>> {
        let path = self.path_for(key);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(anyhow::format_err!("Couldn't open {path:?}: {}", e)),
        };
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| anyhow::format_err!("Couldn't read {path:?}: {}", e))?;
        Record::from_json(&contents)
            .map(Some)
            .map_err(|e| e.context(format!("Couldn't parse {path:?}")))
    }

    fn save_record(&self, key: &str, record: Record) -> anyhow::Result<()> {
        let path = self.path_for(key);
        let json = record.to_json()?;
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| anyhow::format_err!("Unable to create {:?}: {}", self.dir, e))?;
        let mut file = File::create(&path)
            .map_err(|e| anyhow::format_err!("Unable to create {path:?}: {}", e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| anyhow::format_err!("Unable to write {path:?}: {}", e))?;
        Ok(())
    }
}
