use crate::error::Error;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Persistent storage for breakpoint or watchpoint records.
pub trait Store<T>: Send {
    fn load(&self) -> Result<Vec<T>, Error>;

    fn save(&self, rows: &[T]) -> Result<(), Error>;
}

/// Where records are persisted. Project and global storage are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageScope {
    /// `<project dir>/.cdm`
    Project(PathBuf),
    /// `~/.config/cdmdbg`
    Global,
}

impl StorageScope {
    const GLOBAL_DIR: &'static str = ".config/cdmdbg";
    const PROJECT_DIR: &'static str = ".cdm";

    pub fn dir(&self) -> Option<PathBuf> {
        match self {
            StorageScope::Project(project) => Some(project.join(Self::PROJECT_DIR)),
            StorageScope::Global => home::home_dir().map(|home| home.join(Self::GLOBAL_DIR)),
        }
    }
}

/// Store records as a json array in a regular file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Breakpoint store in a scope, `None` if scope directory can't be determined.
    pub fn breakpoints(scope: &StorageScope) -> Option<Self> {
        scope.dir().map(|dir| Self::new(dir.join("breakpoints.json")))
    }

    /// Watchpoint store in a scope, `None` if scope directory can't be determined.
    pub fn watchpoints(scope: &StorageScope) -> Option<Self> {
        scope.dir().map(|dir| Self::new(dir.join("watchpoints.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: Serialize + DeserializeOwned> Store<T> for JsonFileStore {
    fn load(&self) -> Result<Vec<T>, Error> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let data = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, rows: &[T]) -> Result<(), Error> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(rows)?)?;
        Ok(())
    }
}
