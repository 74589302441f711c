use crate::config::ClientLauncher;
use crate::error::Error;
use crate::process::ProcessKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Working directory of a launched script.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkingDir {
    /// Directory containing the script.
    #[default]
    ScriptLocation,
    Specific(PathBuf),
}

/// Environment of a launched script.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Copy of the IDE environment.
    #[default]
    Inherit,
    /// Copy of the IDE environment plus (or overridden by) given variables.
    InheritPlus(BTreeMap<String, String>),
    /// Exactly the given variables.
    Specific(BTreeMap<String, String>),
}

/// Per script launch parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParameters {
    /// Script arguments, split with shell quoting rules.
    pub arguments: String,
    pub working_dir: WorkingDir,
    pub environment: Environment,
    /// Tunnel script stdio through the IDE socket.
    pub redirected: bool,
    /// Interpreter used instead of the configured one.
    pub interpreter: Option<String>,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            arguments: String::new(),
            working_dir: WorkingDir::ScriptLocation,
            environment: Environment::Inherit,
            redirected: true,
            interpreter: None,
        }
    }
}

impl RunParameters {
    /// Split argument string into separate arguments.
    pub fn parse_arguments(&self) -> Result<Vec<String>, Error> {
        shlex::split(&self.arguments).ok_or_else(|| {
            Error::Launch(format!("unbalanced quotes in arguments: {}", self.arguments))
        })
    }

    pub fn working_dir(&self, script: &Path) -> PathBuf {
        match &self.working_dir {
            WorkingDir::ScriptLocation => match script.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => PathBuf::from("."),
            },
            WorkingDir::Specific(dir) => dir.clone(),
        }
    }
}

/// Where a socket connecting client must connect to.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub procid: u64,
}

/// Fully resolved launch: program, arguments, working directory and environment.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub environment: Environment,
}

impl LaunchCommand {
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        match &self.environment {
            Environment::Inherit => {}
            Environment::InheritPlus(vars) => {
                cmd.envs(vars);
            }
            Environment::Specific(vars) => {
                cmd.env_clear().envs(vars);
            }
        }
        cmd
    }

    /// Command line as a single string, for logs and IDE messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|arg| shlex::try_quote(arg).unwrap_or(arg.into()).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Return absolute program path, look into `PATH` if program is not a path to an existing file.
pub fn resolve_program(program: &str) -> Result<String, Error> {
    if Path::new(program).exists() {
        return Ok(program.to_string());
    }
    which::which(program)
        .map(|path| path.to_string_lossy().to_string())
        .map_err(|e| Error::InterpreterNotFound(program.to_string(), e))
}

/// Everything needed to build a launch command.
pub struct LaunchPlan<'a> {
    pub kind: ProcessKind,
    pub script: &'a Path,
    pub params: &'a RunParameters,
    pub interpreter: &'a str,
    /// Client and endpoint for socket connecting launches, `None` for detached ones.
    pub client: Option<(&'a ClientLauncher, Endpoint)>,
    /// Extra client flags placed before the `--` separator.
    pub client_flags: Vec<String>,
    pub profile_output: Option<&'a Path>,
}

impl LaunchPlan<'_> {
    pub fn build(&self) -> Result<LaunchCommand, Error> {
        let interpreter = self.params.interpreter.as_deref().unwrap_or(self.interpreter);
        let interpreter = resolve_program(interpreter)?;

        let mut debuggee = vec![interpreter];
        if self.kind == ProcessKind::Profile {
            let output = self.profile_output.ok_or_else(|| {
                Error::Launch("profile launch without an output file".to_string())
            })?;
            debuggee.extend([
                "-m".to_string(),
                "cProfile".to_string(),
                "-o".to_string(),
                output.to_string_lossy().to_string(),
            ]);
        }
        debuggee.push(self.script.to_string_lossy().to_string());
        debuggee.extend(self.params.parse_arguments()?);

        let (program, args) = match &self.client {
            None => {
                let program = debuggee.remove(0);
                (program, debuggee)
            }
            Some((launcher, endpoint)) => {
                let mut args = launcher.args.clone();
                args.extend([
                    "--host".to_string(),
                    endpoint.host.clone(),
                    "--port".to_string(),
                    endpoint.port.to_string(),
                    "--procid".to_string(),
                    endpoint.procid.to_string(),
                ]);
                args.extend(self.client_flags.iter().cloned());
                args.push("--".to_string());
                args.extend(debuggee);
                (resolve_program(&launcher.program)?, args)
            }
        };

        Ok(LaunchCommand {
            program,
            args,
            cwd: self.params.working_dir(self.script),
            environment: self.params.environment.clone(),
        })
    }
}
