use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
#[cfg(test)]
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

const PROJECT_DIR: &str = ".tally";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    Tasks,
    Categories,
    Completions,
    Theme,
}

impl StoreKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::Tasks => "tasks",
            StoreKey::Categories => "categories",
            StoreKey::Completions => "completions",
            StoreKey::Theme => "theme",
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole-record key-value persistence.
pub trait Store {
    fn load_raw(&self, key: StoreKey) -> Result<Option<String>>;
    fn save_raw(&mut self, key: StoreKey, contents: &str) -> Result<()>;

    fn load<T: DeserializeOwned>(&self, key: StoreKey) -> Result<Option<T>>
    where
        Self: Sized,
    {
        match self.load_raw(key)? {
            Some(raw) if !raw.trim().is_empty() => {
                let value = serde_yaml::from_str(&raw)
                    .with_context(|| format!("parsing stored {}", key))?;
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }

    fn save<T: Serialize>(&mut self, key: StoreKey, value: &T) -> Result<()>
    where
        Self: Sized,
    {
        let serialized =
            serde_yaml::to_string(value).with_context(|| format!("serializing {}", key))?;
        self.save_raw(key, &serialized)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    Project,
    Global,
    Explicit,
}

impl StoreScope {
    pub fn label(&self) -> &'static str {
        match self {
            StoreScope::Project => "project",
            StoreScope::Global => "global",
            StoreScope::Explicit => "custom",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub dir: PathBuf,
    pub scope: StoreScope,
}

/// One `<key>.yml` file per record inside a data directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    location: StoreLocation,
}

impl DirStore {
    pub fn new(location: StoreLocation) -> Self {
        DirStore { location }
    }

    pub fn path_for(&self, key: StoreKey) -> PathBuf {
        self.location.dir.join(format!("{}.yml", key))
    }
}

impl Store for DirStore {
    fn load_raw(&self, key: StoreKey) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            tracing::debug!(%key, path = %path.display(), "no stored record");
            return Ok(None);
        }
        let data = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
        tracing::debug!(%key, path = %path.display(), "loaded record");
        Ok(Some(data))
    }

    fn save_raw(&mut self, key: StoreKey, contents: &str) -> Result<()> {
        let dir = &self.location.dir;
        fs::create_dir_all(dir).with_context(|| format!("creating {:?}", dir))?;
        let path = self.path_for(key);
        let tmp = path.with_extension("yml.tmp");
        fs::write(&tmp, contents).with_context(|| format!("writing {:?}", tmp))?;
        fs::rename(&tmp, &path).with_context(|| format!("replacing {:?}", path))?;
        tracing::info!(%key, path = %path.display(), "saved record");
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: HashMap<StoreKey, String>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn raw(&self, key: StoreKey) -> Option<&str> {
        self.records.get(&key).map(|s| s.as_str())
    }
}

#[cfg(test)]
impl Store for MemoryStore {
    fn load_raw(&self, key: StoreKey) -> Result<Option<String>> {
        Ok(self.records.get(&key).cloned())
    }

    fn save_raw(&mut self, key: StoreKey, contents: &str) -> Result<()> {
        self.records.insert(key, contents.to_string());
        Ok(())
    }
}

pub fn init_project_store() -> Result<StoreLocation> {
    let cwd = env::current_dir()?;
    let dir = cwd.join(PROJECT_DIR);
    fs::create_dir_all(&dir).with_context(|| format!("creating {:?}", dir))?;
    Ok(StoreLocation {
        dir,
        scope: StoreScope::Project,
    })
}

pub fn locate_store(start: &Path, explicit: Option<PathBuf>) -> Result<StoreLocation> {
    if let Some(dir) = explicit {
        return Ok(StoreLocation {
            dir,
            scope: StoreScope::Explicit,
        });
    }
    if let Some(dir) = find_project_store(start) {
        return Ok(StoreLocation {
            dir,
            scope: StoreScope::Project,
        });
    }
    Ok(StoreLocation {
        dir: global_store_dir()?,
        scope: StoreScope::Global,
    })
}

fn find_project_store(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(PROJECT_DIR);
        if candidate.is_dir() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

fn global_store_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "tally").context("locating data directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
