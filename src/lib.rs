//! IDE side run manager and debugger core for Python scripts.
//!
//! Scripts run out of process and connect back to the IDE over a line delimited JSON
//! protocol. [`runmgr::RunManager`] owns launched processes, [`debugger::DebuggerServer`]
//! drives a single debug session and [`workbench::Workbench`] glues them together.

pub mod client;
pub mod config;
pub mod debugger;
pub mod error;
pub mod log;
pub mod process;
pub mod protocol;
pub mod runmgr;
pub mod ui;
pub mod workbench;

pub use error::Error;
