use crate::error::Error;
use crate::process::params::RunParameters;
use crate::weak_error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Run parameters remembered per script.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RunParamsCache {
    params: HashMap<PathBuf, RunParameters>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl RunParamsCache {
    /// Cache that lives in memory only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache persisted into a json file. A missing or broken file gives an empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut cache = fs::read_to_string(&path)
            .ok()
            .and_then(|data| {
                weak_error!(
                    serde_json::from_str::<RunParamsCache>(&data),
                    "run parameters cache:"
                )
            })
            .unwrap_or_default();
        cache.path = Some(path);
        cache
    }

    pub fn get(&self, script: &Path) -> Option<&RunParameters> {
        self.params.get(script)
    }

    pub fn set(&mut self, script: &Path, params: RunParameters) {
        self.params.insert(script.to_path_buf(), params);
        weak_error!(self.save(), "save run parameters:");
    }

    /// Return parameters for a launch. An override is remembered for later launches.
    pub fn resolve(
        &mut self,
        script: &Path,
        params_override: Option<RunParameters>,
    ) -> RunParameters {
        match params_override {
            Some(params) => {
                self.set(script, params.clone());
                params
            }
            None => self.get(script).cloned().unwrap_or_default(),
        }
    }

    fn save(&self) -> Result<(), Error> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
