use crate::debugger::model::{Row, Table};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Additional trigger of a watch expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchSpecial {
    /// Trigger when the condition is true.
    #[default]
    None,
    /// Trigger when the variable is created.
    Created,
    /// Trigger when the variable value changes.
    Changed,
}

impl WatchSpecial {
    /// Wire representation understood by debuggee clients.
    pub fn as_wire(&self) -> &'static str {
        match self {
            WatchSpecial::None => "",
            WatchSpecial::Created => "??created??",
            WatchSpecial::Changed => "??changed??",
        }
    }
}

fn enabled_default() -> bool {
    true
}

/// Watch expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watchpoint {
    pub condition: String,
    #[serde(default)]
    pub special: WatchSpecial,
    #[serde(rename = "temp", default)]
    pub temporary: bool,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(rename = "ignorecnt", default)]
    pub ignore_count: u32,
}

impl Watchpoint {
    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            special: WatchSpecial::None,
            temporary: false,
            enabled: true,
            ignore_count: 0,
        }
    }

    pub fn with_special(mut self, special: WatchSpecial) -> Self {
        self.special = special;
        self
    }
}

impl Display for Watchpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.special {
            WatchSpecial::None => f.write_str(&self.condition),
            special => write!(f, "{} {}", self.condition, special.as_wire()),
        }
    }
}

impl Row for Watchpoint {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn same_key(&self, other: &Self) -> bool {
        self.condition == other.condition && self.special == other.special
    }
}

pub type WatchpointModel = Table<Watchpoint>;

impl Table<Watchpoint> {
    /// Return index of a watchpoint with exact condition and trigger.
    pub fn index_of(&self, condition: &str, special: WatchSpecial) -> Option<usize> {
        self.position(|wp| wp.special == special && wp.condition == condition)
    }

    /// Return index of the first watchpoint with a condition, whatever its trigger.
    pub fn index_of_condition(&self, condition: &str) -> Option<usize> {
        self.position(|wp| wp.condition == condition)
    }
}
