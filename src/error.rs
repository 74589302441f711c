use crate::debugger::DebuggerState;
use crate::protocol::ProtocolError;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- generic errors --------------------------------------------
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("config parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    // --------------------------------- launch errors ---------------------------------------------
    #[error("launch: {0}")]
    Launch(String),
    #[error("spawn `{0}`: {1}")]
    Spawn(String, std::io::Error),
    #[error("interpreter `{0}` not found: {1}")]
    InterpreterNotFound(String, which::Error),
    #[error("listening socket: {0}")]
    Listen(std::io::Error),

    // --------------------------------- session errors --------------------------------------------
    #[error("handshake: {0}")]
    Handshake(String),
    #[error("process {procid} did not connect in {timeout:?}")]
    HandshakeTimeout { procid: u64, timeout: Duration },
    #[error("debugger is in {actual} state, expected {expected}")]
    SessionState {
        expected: &'static str,
        actual: DebuggerState,
    },
    #[error("process {0} is not found")]
    ProcessNotFound(u64),
    #[error("process {0} is not connected")]
    NotConnected(u64),
    #[error("connection to process {0} is lost")]
    Disconnected(u64),

    // --------------------------------- model errors ----------------------------------------------
    #[error("line {1} of {0:?} is not breakable")]
    NotBreakable(std::path::PathBuf, u32),
    #[error("no breakpoint at {0}")]
    BreakpointNotFound(String),
    #[error("no watchpoint `{0}`")]
    WatchpointNotFound(String),
    #[error("{0} already exists")]
    Duplicate(String),
}

impl Error {
    /// Return a hint to an interface - continue working after error or stop whole process.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::IO(_) => false,
            Error::Json(_) => false,
            Error::Toml(_) => false,
            Error::Protocol(_) => false,
            Error::Launch(_) => false,
            Error::Spawn(_, _) => false,
            Error::InterpreterNotFound(_, _) => false,
            Error::Handshake(_) => false,
            Error::HandshakeTimeout { .. } => false,
            Error::SessionState { .. } => false,
            Error::ProcessNotFound(_) => false,
            Error::NotConnected(_) => false,
            Error::Disconnected(_) => false,
            Error::NotBreakable(_, _) => false,
            Error::BreakpointNotFound(_) => false,
            Error::WatchpointNotFound(_) => false,
            Error::Duplicate(_) => false,

            // without a listener no process can ever connect back
            Error::Listen(_) => true,
        }
    }
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "debugger", "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "debugger", concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        $crate::_error!(log::warn, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::warn, $res, $msg)
    };
}

/// Transforms `Result` into `Option` and put error into debug logs if it occurs.
#[macro_export]
macro_rules! muted_error {
    ($res: expr) => {
        $crate::_error!(log::debug, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::debug, $res, $msg)
    };
}
