use crate::debugger::breakpoint::Breakpoint;
use crate::debugger::{DebuggerHook, DebuggerServer};
use crate::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add {
        file: PathBuf,
        line: u32,
        condition: Option<String>,
        temporary: bool,
    },
    Remove(PathBuf, u32),
    Enable(PathBuf, u32, bool),
    Ignore(PathBuf, u32, u32),
    Clear,
    Info,
}

pub enum HandlingResult {
    New(Breakpoint),
    Removed(Breakpoint),
    Updated(Breakpoint),
    Cleared(usize),
    Dump(Vec<Breakpoint>),
}

pub struct Handler<'a, H: DebuggerHook> {
    dbg: &'a mut DebuggerServer<H>,
}

impl<'a, H: DebuggerHook> Handler<'a, H> {
    pub fn new(debugger: &'a mut DebuggerServer<H>) -> Self {
        Self { dbg: debugger }
    }

    pub fn handle(&mut self, cmd: Command) -> Result<HandlingResult, Error> {
        let result = match cmd {
            Command::Add {
                file,
                line,
                condition,
                temporary,
            } => {
                let file = absolute(&file);
                if !self.dbg.is_breakable(&file, line) {
                    return Err(Error::NotBreakable(file, line));
                }
                let mut bp = Breakpoint::new(file, line).temporary(temporary);
                if let Some(condition) = condition {
                    bp = bp.with_condition(condition);
                }
                if !self.dbg.update_breakpoints(|model| model.add(bp.clone())) {
                    return Err(Error::Duplicate(format!("breakpoint {bp}")));
                }
                HandlingResult::New(bp)
            }
            Command::Remove(file, line) => {
                let (idx, bp) = self.find(&file, line)?;
                self.dbg.update_breakpoints(|model| model.delete_by_index(idx));
                HandlingResult::Removed(bp)
            }
            Command::Enable(file, line, enable) => {
                let (idx, mut bp) = self.find(&file, line)?;
                self.dbg
                    .update_breakpoints(|model| model.set_enabled_by_index(idx, enable));
                bp.enabled = enable;
                HandlingResult::Updated(bp)
            }
            Command::Ignore(file, line, count) => {
                let (idx, bp) = self.find(&file, line)?;
                let bp = bp.with_ignore_count(count);
                self.dbg
                    .update_breakpoints(|model| model.set_by_index(idx, bp.clone()));
                HandlingResult::Updated(bp)
            }
            Command::Clear => {
                let count = self.dbg.breakpoints().len();
                self.dbg.update_breakpoints(|model| model.delete_all());
                HandlingResult::Cleared(count)
            }
            Command::Info => HandlingResult::Dump(self.dbg.breakpoints().rows().to_vec()),
        };
        Ok(result)
    }

    fn find(&self, file: &Path, line: u32) -> Result<(usize, Breakpoint), Error> {
        let file = absolute(file);
        let model = self.dbg.breakpoints();
        model
            .index_of(&file, line)
            .and_then(|idx| model.get(idx).map(|bp| (idx, bp.clone())))
            .ok_or_else(|| Error::BreakpointNotFound(format!("{}:{line}", file.display())))
    }
}

fn absolute(file: &Path) -> PathBuf {
    fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf())
}
