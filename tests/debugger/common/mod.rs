use cdmdbg::debugger::breakpoint::Breakpoint;
use cdmdbg::debugger::lines::BreakableLines;
use cdmdbg::debugger::watchpoint::Watchpoint;
use cdmdbg::debugger::{
    DebuggerBuilder, DebuggerHook, DebuggerServer, DebuggerSettings, DebuggerState, ExceptionInfo,
};
use cdmdbg::process::link::MessageSink;
use cdmdbg::process::params::RunParameters;
use cdmdbg::protocol::params::{ForkTarget, StackFrame};
use cdmdbg::protocol::{Message, Method};
use cdmdbg::Error;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const PROCID: u64 = 7;

pub const SCRIPT: &str = r#"import sys

def main():
    x = 1
    print(x)

main()
"#;

/// Sink that keeps every sent message.
#[derive(Clone, Default)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<Message> {
        std::mem::take(&mut *self.messages.lock().unwrap())
    }

    pub fn methods(&self) -> Vec<Method> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.method)
            .collect()
    }
}

impl MessageSink for RecordingSink {
    fn send(&self, message: Message) -> Result<(), Error> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct TestInfo {
    pub states: Arc<RefCell<Vec<DebuggerState>>>,
    pub line: Arc<Cell<Option<u32>>>,
    pub file: Arc<RefCell<Option<String>>>,
    pub exception: Arc<RefCell<Option<ExceptionInfo>>>,
    pub fork_asked: Arc<Cell<u32>>,
    pub fork_target: Arc<Cell<Option<ForkTarget>>>,
    pub edited_breakpoint: Arc<RefCell<Option<Breakpoint>>>,
    pub edited_watchpoint: Arc<RefCell<Option<Watchpoint>>>,
}

#[derive(Default)]
pub struct TestHooks {
    info: TestInfo,
}

impl TestHooks {
    pub fn new(info: TestInfo) -> Self {
        Self { info }
    }
}

impl DebuggerHook for TestHooks {
    fn on_state_changed(&self, state: DebuggerState) {
        self.info.states.borrow_mut().push(state);
    }

    fn on_line(&self, stack: &[StackFrame]) {
        let top = &stack[0];
        self.info.line.set(Some(top.line));
        self.info.file.replace(Some(top.filename.clone()));
    }

    fn on_exception(&self, exception: &ExceptionInfo) {
        self.info.exception.replace(Some(exception.clone()));
    }

    fn on_fork(&self) -> ForkTarget {
        self.info.fork_asked.set(self.info.fork_asked.get() + 1);
        self.info.fork_target.get().unwrap_or(ForkTarget::Parent)
    }

    fn on_breakpoint_condition_error(&self, _: &Breakpoint) -> Option<Breakpoint> {
        self.info.edited_breakpoint.borrow().clone()
    }

    fn on_watchpoint_condition_error(&self, _: &Watchpoint) -> Option<Watchpoint> {
        self.info.edited_watchpoint.borrow().clone()
    }
}

/// Every line of every file is breakable.
pub struct AllLines;

impl BreakableLines for AllLines {
    fn breakable_lines(&mut self, _: &Path) -> Option<BTreeSet<u32>> {
        Some((1..=1000).collect())
    }
}

/// Temporary project directory with a debugged script.
pub struct Project {
    pub dir: TempDir,
    pub script: PathBuf,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("main.py");
        fs::write(&script, SCRIPT).unwrap();
        let script = fs::canonicalize(script).unwrap();
        Self { dir, script }
    }

    pub fn script_name(&self) -> String {
        self.script.to_string_lossy().to_string()
    }
}

pub fn debugger(info: &TestInfo) -> DebuggerServer<TestHooks> {
    DebuggerBuilder::new(TestHooks::new(info.clone())).build()
}

/// Start a debug session of `script` with a recording sink.
pub fn start_session(
    debugger: &mut DebuggerServer<TestHooks>,
    script: &Path,
    settings: DebuggerSettings,
) -> RecordingSink {
    let sink = RecordingSink::default();
    debugger
        .on_debug_session_started(
            PROCID,
            Box::new(sink.clone()),
            script,
            RunParameters::default(),
            settings,
        )
        .unwrap();
    sink
}

pub fn message(method: Method, params: Value) -> Message {
    Message::with_params(method, &params).unwrap()
}

pub fn stack_message(method: Method, file: &str, line: u32) -> Message {
    message(
        method,
        json!({"stack": [{"filename": file, "line": line, "function": "main", "arguments": ""}]}),
    )
}
