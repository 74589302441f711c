use crate::debugger::model::{Row, Table};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

fn enabled_default() -> bool {
    true
}

/// Source line breakpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Absolute path to a source file.
    pub file: PathBuf,
    /// 1-based line number.
    pub line: u32,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(rename = "temp", default)]
    pub temporary: bool,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(rename = "ignorecnt", default)]
    pub ignore_count: u32,
}

impl Breakpoint {
    pub fn new(file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            condition: None,
            temporary: false,
            enabled: true,
            ignore_count: 0,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into()).filter(|c: &String| !c.trim().is_empty());
        self
    }

    pub fn temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    pub fn with_ignore_count(mut self, count: u32) -> Self {
        self.ignore_count = count;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn filename(&self) -> String {
        self.file.to_string_lossy().to_string()
    }
}

impl Display for Breakpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

impl Row for Breakpoint {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn same_key(&self, other: &Self) -> bool {
        self.line == other.line && self.file == other.file
    }
}

pub type BreakpointModel = Table<Breakpoint>;

impl Table<Breakpoint> {
    /// Return index of a breakpoint at a source location.
    pub fn index_of(&self, file: &Path, line: u32) -> Option<usize> {
        self.position(|bp| bp.line == line && bp.file == file)
    }
}
