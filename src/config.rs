use crate::debugger::DebuggerSettings;
use crate::error::Error;
use crate::muted_error;
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Debuggee side client executable and its leading arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientLauncher {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ClientLauncher {
    /// `cdm-run` from the directory of the current executable, or from `PATH`.
    fn run_client() -> Self {
        const RUN_CLIENT: &str = "cdm-run";
        let program = std::env::current_exe()
            .ok()
            .map(|exe| exe.with_file_name(RUN_CLIENT))
            .filter(|path| path.exists())
            .map(|path| path.to_string_lossy().to_string())
            .unwrap_or_else(|| RUN_CLIENT.to_string());
        Self {
            program,
            args: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Clients {
    pub run: ClientLauncher,
    pub profile: ClientLauncher,
    pub debug: ClientLauncher,
}

impl Default for Clients {
    fn default() -> Self {
        Self {
            run: ClientLauncher::run_client(),
            profile: ClientLauncher::run_client(),
            debug: ClientLauncher {
                program: "cdm-debug-client".to_string(),
                args: vec![],
            },
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address of the listening socket, processes connect back to it.
    pub host: String,
    /// Default interpreter for scripts.
    pub interpreter: String,
    pub handshake_timeout_secs: u64,
    pub handshake_read_timeout_ms: u64,
    pub tick_interval_ms: u64,
    pub kill_all_timeout_secs: u64,
    pub reap_timeout_secs: u64,
    /// Directory for profiler output, system temp directory if not set.
    pub profile_dir: Option<PathBuf>,
    pub clients: Clients,
    pub debugger: DebuggerSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            interpreter: "python3".to_string(),
            handshake_timeout_secs: 15,
            handshake_read_timeout_ms: 1000,
            tick_interval_ms: 1000,
            kill_all_timeout_secs: 10,
            reap_timeout_secs: 5,
            profile_dir: None,
            clients: Clients::default(),
            debugger: DebuggerSettings::default(),
        }
    }
}

impl Config {
    const DEFAULT_PATH: &'static str = ".config/cdmdbg/config.toml";

    /// Load configuration.
    ///
    /// An explicit path must exist and be valid. Without a path the file from the home
    /// directory is used if present, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let data = match path {
            Some(path) => read_to_string(path)?,
            None => {
                let Some(home) = home::home_dir() else {
                    return Ok(Self::default());
                };
                match muted_error!(read_to_string(home.join(Self::DEFAULT_PATH))) {
                    Some(data) => data,
                    None => return Ok(Self::default()),
                }
            }
        };
        Ok(toml::de::from_str(&data)?)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn handshake_read_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_read_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn kill_all_timeout(&self) -> Duration {
        Duration::from_secs(self.kill_all_timeout_secs)
    }

    pub fn reap_timeout(&self) -> Duration {
        Duration::from_secs(self.reap_timeout_secs)
    }

    pub fn profile_dir(&self) -> PathBuf {
        self.profile_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
