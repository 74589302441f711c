use crate::debugger::watchpoint::{WatchSpecial, Watchpoint};
use crate::debugger::{DebuggerHook, DebuggerServer};
use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add(String, WatchSpecial),
    Remove(String),
    Enable(String, bool),
    Ignore(String, u32),
    Info,
}

pub enum HandlingResult {
    New(Watchpoint),
    Removed(Watchpoint),
    Updated(Watchpoint),
    Dump(Vec<Watchpoint>),
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
            Command::Add(condition, special) => {
                let wp = Watchpoint::new(condition).with_special(special);
                if !self.dbg.update_watchpoints(|model| model.add(wp.clone())) {
                    return Err(Error::Duplicate(format!("watchpoint {wp}")));
                }
                HandlingResult::New(wp)
            }
            Command::Remove(condition) => {
                let (idx, wp) = self.find(&condition)?;
                self.dbg.update_watchpoints(|model| model.delete_by_index(idx));
                HandlingResult::Removed(wp)
            }
            Command::Enable(condition, enable) => {
                let (idx, mut wp) = self.find(&condition)?;
                self.dbg
                    .update_watchpoints(|model| model.set_enabled_by_index(idx, enable));
                wp.enabled = enable;
                HandlingResult::Updated(wp)
            }
            Command::Ignore(condition, count) => {
                let (idx, mut wp) = self.find(&condition)?;
                wp.ignore_count = count;
                self.dbg
                    .update_watchpoints(|model| model.set_by_index(idx, wp.clone()));
                HandlingResult::Updated(wp)
            }
            Command::Info => HandlingResult::Dump(self.dbg.watchpoints().rows().to_vec()),
        };
        Ok(result)
    }

    fn find(&self, condition: &str) -> Result<(usize, Watchpoint), Error> {
        let model = self.dbg.watchpoints();
        model
            .index_of_condition(condition)
            .and_then(|idx| model.get(idx).map(|wp| (idx, wp.clone())))
            .ok_or_else(|| Error::WatchpointNotFound(condition.to_string()))
    }
}
