//! Console commands.
//!
//! Command is a request from a user that defines an action and its arguments. Launch and
//! session commands map directly onto the workbench, breakpoint and watchpoint commands
//! have own handlers that validate input and mutate debugger models.

pub mod r#break;
pub mod parser;
pub mod watch;

use crate::error::Error;
use crate::protocol::params::Scope;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("malformed command: {0}")]
    Parsing(String),
    #[error(transparent)]
    Handle(#[from] Error),
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Script to launch. Without arguments the remembered run parameters are used.
#[derive(Debug, Clone, PartialEq)]
pub struct Launch {
    pub script: PathBuf,
    pub arguments: Option<String>,
}

/// External commands that can be processed by the console.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(Launch),
    Profile(Launch),
    Debug(Launch),
    /// Kill a process, all processes if `None`.
    Kill(Option<u64>),
    Processes,
    /// Line for the process waiting for input.
    Input(String),
    StepInto,
    StepOver,
    StepOut,
    Continue {
        special: bool,
    },
    Stop(Option<i32>),
    Breakpoint(r#break::Command),
    Watchpoint(watch::Command),
    ThreadList,
    ThreadSwitch(i64),
    PrintVariables {
        scope: Scope,
        frame: u32,
    },
    PrintVariable {
        name: String,
        frame: u32,
    },
    Eval(String),
    Exec(String),
    CallTrace(bool),
    Help {
        command: Option<String>,
        reason: Option<String>,
    },
}
