pub mod breakpoint;
pub mod lines;
pub mod model;
pub mod store;
pub mod watchpoint;

use crate::debugger::breakpoint::{Breakpoint, BreakpointModel};
use crate::debugger::lines::{BreakableLines, CachedLines, PythonLines};
use crate::debugger::model::{ChangeKind, ModelSignal, Phase};
use crate::debugger::store::Store;
use crate::debugger::watchpoint::{WatchSpecial, Watchpoint, WatchpointModel};
use crate::error::Error;
use crate::process::link::MessageSink;
use crate::process::params::RunParameters;
use crate::process::FinishStatus;
use crate::protocol::params::{
    BreakpointEnableRequest, BreakpointIgnoreRequest, BreakpointRequest, CallTraceParams,
    CallTraceRequest, ConditionParams, ContinueRequest, EvalParams, EvalRequest, ExceptionParams,
    ExecRequest, ForkTarget, ForkToRequest, LocationParams, OutputParams, Scope, SignalParams,
    StackFrame, StackParams, StepQuitRequest, SyntaxErrorParams, ThreadListParams,
    ThreadSetRequest, VariableParams, VariableRequest, VariablesParams, VariablesRequest,
    WatchEnableRequest, WatchIgnoreRequest, WatchRequest,
};
use crate::protocol::{Message, Method};
use crate::weak_error;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum_macros::Display;

/// Debug session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DebuggerState {
    /// No session.
    #[strum(serialize = "stopped")]
    Stopped,
    /// Debuggee is executing.
    #[strum(serialize = "in client")]
    InClient,
    /// Debuggee is paused, the IDE has control.
    #[strum(serialize = "in ide")]
    InIde,
}

/// Per session debugger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebuggerSettings {
    pub report_exceptions: bool,
    pub trace_interpreter: bool,
    /// Pause on the first line of the script.
    pub stop_at_first_line: bool,
    /// Do not ask which process to follow after a fork.
    pub autofork: bool,
    /// With `autofork` follow the child process, the parent otherwise.
    pub follow_child: bool,
}

impl Default for DebuggerSettings {
    fn default() -> Self {
        Self {
            report_exceptions: true,
            trace_interpreter: false,
            stop_at_first_line: true,
            autofork: false,
            follow_child: false,
        }
    }
}

impl DebuggerSettings {
    /// Debug client flags reflecting these settings.
    pub fn client_flags(&self, redirected: bool) -> Vec<String> {
        let mut flags = vec![];
        if self.report_exceptions {
            flags.push("--report-exceptions".to_string());
        }
        if self.trace_interpreter {
            flags.push("--trace-interpreter".to_string());
        }
        if self.autofork {
            flags.push("--autofork".to_string());
            if self.follow_child {
                flags.push("--fork-child".to_string());
            }
        }
        if !redirected {
            flags.push("--no-redirect".to_string());
        }
        flags
    }
}

/// Exception reported by the debuggee.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionInfo {
    pub exc_type: Option<String>,
    pub message: String,
    pub stack: Vec<StackFrame>,
    pub unhandled: bool,
}

/// Observer of a debug session.
pub trait DebuggerHook {
    fn on_state_changed(&self, _state: DebuggerState) {}

    /// Debuggee paused at the top frame of `stack`.
    fn on_line(&self, _stack: &[StackFrame]) {}

    fn on_exception(&self, _exception: &ExceptionInfo) {}

    fn on_thread_list(&self, _threads: &ThreadListParams) {}

    fn on_thread_set(&self) {}

    fn on_variables(&self, _variables: &VariablesParams) {}

    fn on_variable(&self, _variable: &VariableParams) {}

    fn on_eval(&self, _result: &EvalParams) {}

    fn on_exec_output(&self, _text: &str) {}

    fn on_exec_error(&self, _text: &str) {}

    fn on_syntax_error(&self, _error: &SyntaxErrorParams) {}

    fn on_signal(&self, _signal: &SignalParams) {}

    fn on_call_trace(&self, _event: &CallTraceParams) {}

    /// Debuggee forked, return the process to follow.
    fn on_fork(&self) -> ForkTarget {
        ForkTarget::Parent
    }

    /// Breakpoint condition doesn't compile, return an edited breakpoint to replace it.
    fn on_breakpoint_condition_error(&self, _breakpoint: &Breakpoint) -> Option<Breakpoint> {
        None
    }

    /// Watchpoint condition doesn't compile, return an edited watchpoint to replace it.
    fn on_watchpoint_condition_error(&self, _watchpoint: &Watchpoint) -> Option<Watchpoint> {
        None
    }
}

pub struct NopHook {}

impl DebuggerHook for NopHook {}

struct Session {
    procid: u64,
    sink: Box<dyn MessageSink>,
    script: PathBuf,
    params: RunParameters,
    settings: DebuggerSettings,
}

/// Debugger builder.
pub struct DebuggerBuilder<H: DebuggerHook> {
    hooks: H,
    breakpoint_store: Option<Box<dyn Store<Breakpoint>>>,
    watchpoint_store: Option<Box<dyn Store<Watchpoint>>>,
    lines: Option<Box<dyn BreakableLines>>,
}

impl<H: DebuggerHook> DebuggerBuilder<H> {
    pub fn new(hooks: H) -> Self {
        Self {
            hooks,
            breakpoint_store: None,
            watchpoint_store: None,
            lines: None,
        }
    }

    pub fn with_breakpoint_store(self, store: impl Store<Breakpoint> + 'static) -> Self {
        Self {
            breakpoint_store: Some(Box::new(store)),
            ..self
        }
    }

    pub fn with_watchpoint_store(self, store: impl Store<Watchpoint> + 'static) -> Self {
        Self {
            watchpoint_store: Some(Box::new(store)),
            ..self
        }
    }

    pub fn with_breakable_lines(self, lines: impl BreakableLines + 'static) -> Self {
        Self {
            lines: Some(Box::new(lines)),
            ..self
        }
    }

    /// Create a debugger, load stored breakpoints and watchpoints and drop invalid breakpoints.
    pub fn build(self) -> DebuggerServer<H> {
        let mut breakpoints = BreakpointModel::new();
        if let Some(store) = &self.breakpoint_store {
            if let Some(rows) = weak_error!(store.load(), "load breakpoints:") {
                for bp in rows {
                    breakpoints.add(bp);
                }
            }
        }
        breakpoints.take_signals();

        let mut watchpoints = WatchpointModel::new();
        if let Some(store) = &self.watchpoint_store {
            if let Some(rows) = weak_error!(store.load(), "load watchpoints:") {
                for wp in rows {
                    watchpoints.add(wp);
                }
            }
        }
        watchpoints.take_signals();

        let mut debugger = DebuggerServer {
            hooks: self.hooks,
            state: DebuggerState::Stopped,
            session: None,
            stop_at_first_line: true,
            breakpoints,
            watchpoints,
            breakpoint_store: self.breakpoint_store,
            watchpoint_store: self.watchpoint_store,
            lines: self
                .lines
                .unwrap_or_else(|| Box::new(CachedLines::new(PythonLines))),
        };
        debugger.validate_breakpoints();
        debugger
    }
}

/// Debug session controller.
///
/// Owns breakpoint and watchpoint models and keeps them in sync with a live debuggee.
pub struct DebuggerServer<H: DebuggerHook> {
    hooks: H,
    state: DebuggerState,
    session: Option<Session>,
    stop_at_first_line: bool,
    breakpoints: BreakpointModel,
    watchpoints: WatchpointModel,
    breakpoint_store: Option<Box<dyn Store<Breakpoint>>>,
    watchpoint_store: Option<Box<dyn Store<Watchpoint>>>,
    lines: Box<dyn BreakableLines>,
}

impl<H: DebuggerHook> DebuggerServer<H> {
    pub fn state(&self) -> DebuggerState {
        self.state
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Launch identifier of the debugged process.
    pub fn procid(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.procid)
    }

    pub fn script(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.script.as_path())
    }

    pub fn run_parameters(&self) -> Option<&RunParameters> {
        self.session.as_ref().map(|s| &s.params)
    }

    pub fn breakpoints(&self) -> &BreakpointModel {
        &self.breakpoints
    }

    pub fn watchpoints(&self) -> &WatchpointModel {
        &self.watchpoints
    }

    fn set_state(&mut self, state: DebuggerState) {
        if self.state != state {
            debug!(target: "debugger", "state {} -> {state}", self.state);
            self.state = state;
            self.hooks.on_state_changed(state);
        }
    }

    fn active_session(&self) -> Result<&Session, Error> {
        match &self.session {
            Some(session) if self.state != DebuggerState::Stopped => Ok(session),
            _ => Err(Error::SessionState {
                expected: "in client or in ide",
                actual: self.state,
            }),
        }
    }

    fn send(&self, message: Message) -> Result<(), Error> {
        self.active_session()?.sink.send(message)
    }

    fn send_with<P: Serialize>(&self, method: Method, params: &P) -> Result<(), Error> {
        self.send(Message::with_params(method, params)?)
    }

    // ------------------------------------ session lifecycle --------------------------------------

    /// Bind a freshly launched process. Only one session may be active.
    ///
    /// # Arguments
    ///
    /// * `procid`: launch identifier of the process
    /// * `sink`: outgoing side of the process connection
    /// * `script`: debugged script
    /// * `params`: run parameters of the launch
    /// * `settings`: debugger settings of the launch
    pub fn on_debug_session_started(
        &mut self,
        procid: u64,
        sink: Box<dyn MessageSink>,
        script: &Path,
        params: RunParameters,
        settings: DebuggerSettings,
    ) -> Result<(), Error> {
        if self.state != DebuggerState::Stopped {
            return Err(Error::SessionState {
                expected: "stopped",
                actual: self.state,
            });
        }

        // no session yet, so dropped breakpoints are never announced to the debuggee
        self.validate_breakpoints();

        info!(
            target: "debugger",
            "debug session of process {procid} started: {}",
            script.display()
        );
        self.stop_at_first_line = settings.stop_at_first_line;
        self.session = Some(Session {
            procid,
            sink,
            script: script.to_path_buf(),
            params,
            settings,
        });
        self.set_state(DebuggerState::InClient);
        Ok(())
    }

    /// Handle process termination, reset session if it is the debugged process.
    pub fn on_process_finished(&mut self, procid: u64, status: FinishStatus) {
        if self.procid() != Some(procid) {
            return;
        }
        info!(target: "debugger", "debug session of process {procid} finished: {status}");
        self.session = None;
        self.stop_at_first_line = true;
        self.save_breakpoints();
        self.save_watchpoints();
        self.set_state(DebuggerState::Stopped);
    }

    /// Remove breakpoints that point to missing files or non-breakable lines.
    pub fn validate_breakpoints(&mut self) {
        let mut invalid = vec![];
        for (idx, bp) in self.breakpoints.rows().iter().enumerate() {
            if !bp.file.exists() {
                warn!(target: "debugger", "breakpoint {bp} removed: file does not exist");
                invalid.push(idx);
                continue;
            }
            match self.lines.breakable_lines(&bp.file) {
                None => {
                    warn!(target: "debugger", "breakpoint {bp} removed: file can't be parsed");
                    invalid.push(idx);
                }
                Some(lines) if !lines.contains(&bp.line) => {
                    warn!(target: "debugger", "breakpoint {bp} removed: line is not breakable");
                    invalid.push(idx);
                }
                Some(_) => {}
            }
        }

        if !invalid.is_empty() {
            self.update_breakpoints(|model| model.delete_list(&invalid));
        }
    }

    /// Check that a breakpoint may be placed at `file:line`.
    pub fn is_breakable(&mut self, file: &Path, line: u32) -> bool {
        self.lines
            .breakable_lines(file)
            .is_some_and(|lines| lines.contains(&line))
    }

    // ------------------------------------ model sync ---------------------------------------------

    /// Mutate breakpoints. While a session is active every change is mirrored to the debuggee.
    pub fn update_breakpoints<R>(&mut self, f: impl FnOnce(&mut BreakpointModel) -> R) -> R {
        self.apply_breakpoints(true, f)
    }

    /// Mutate watchpoints. While a session is active every change is mirrored to the debuggee.
    pub fn update_watchpoints<R>(&mut self, f: impl FnOnce(&mut WatchpointModel) -> R) -> R {
        self.apply_watchpoints(true, f)
    }

    fn apply_breakpoints<R>(
        &mut self,
        mirror: bool,
        f: impl FnOnce(&mut BreakpointModel) -> R,
    ) -> R {
        let result = f(&mut self.breakpoints);
        let signals = self.breakpoints.take_signals();
        if signals.is_empty() {
            return result;
        }
        if mirror && self.state != DebuggerState::Stopped {
            signals
                .iter()
                .for_each(|signal| {
                    self.mirror(signal, Self::send_breakpoint, Self::clear_breakpoint)
                });
        }
        self.save_breakpoints();
        result
    }

    fn apply_watchpoints<R>(
        &mut self,
        mirror: bool,
        f: impl FnOnce(&mut WatchpointModel) -> R,
    ) -> R {
        let result = f(&mut self.watchpoints);
        let signals = self.watchpoints.take_signals();
        if signals.is_empty() {
            return result;
        }
        if mirror && self.state != DebuggerState::Stopped {
            signals
                .iter()
                .for_each(|signal| {
                    self.mirror(signal, Self::send_watchpoint, Self::clear_watchpoint)
                });
        }
        self.save_watchpoints();
        result
    }

    fn mirror<T>(
        &self,
        signal: &ModelSignal<T>,
        set: fn(&Self, &T) -> Result<(), Error>,
        clear: fn(&Self, &T) -> Result<(), Error>,
    ) {
        let action = match (signal.phase, signal.kind) {
            (Phase::Changed, ChangeKind::Insert | ChangeKind::Update) => set,
            (Phase::AboutToChange, ChangeKind::Update | ChangeKind::Remove) => clear,
            _ => return,
        };
        for row in &signal.rows {
            weak_error!(action(self, row), "sync with debuggee:");
        }
    }

    fn save_breakpoints(&self) {
        if let Some(store) = &self.breakpoint_store {
            weak_error!(store.save(self.breakpoints.rows()), "save breakpoints:");
        }
    }

    fn save_watchpoints(&self) {
        if let Some(store) = &self.watchpoint_store {
            weak_error!(store.save(self.watchpoints.rows()), "save watchpoints:");
        }
    }

    fn send_breakpoint(&self, bp: &Breakpoint) -> Result<(), Error> {
        self.send_with(
            Method::RequestBreakpoint,
            &BreakpointRequest {
                filename: bp.filename(),
                line: bp.line,
                set_breakpoint: true,
                condition: bp.condition.clone(),
                temporary: bp.temporary,
            },
        )?;
        if !bp.enabled {
            self.remote_breakpoint_enable(&bp.file, bp.line, false)?;
        }
        if bp.ignore_count > 0 {
            self.remote_breakpoint_ignore(&bp.file, bp.line, bp.ignore_count)?;
        }
        Ok(())
    }

    fn clear_breakpoint(&self, bp: &Breakpoint) -> Result<(), Error> {
        self.remote_breakpoint(&bp.file, bp.line, false, None, false)
    }

    fn send_watchpoint(&self, wp: &Watchpoint) -> Result<(), Error> {
        self.remote_watchpoint(&wp.condition, wp.special, true, wp.temporary)?;
        if !wp.enabled {
            self.remote_watchpoint_enable(&wp.condition, false)?;
        }
        if wp.ignore_count > 0 {
            self.remote_watchpoint_ignore(&wp.condition, wp.ignore_count)?;
        }
        Ok(())
    }

    fn clear_watchpoint(&self, wp: &Watchpoint) -> Result<(), Error> {
        self.remote_watchpoint(&wp.condition, wp.special, false, wp.temporary)
    }

    /// Push every breakpoint and watchpoint to the debuggee.
    fn send_startup_state(&self) -> Result<(), Error> {
        for bp in self.breakpoints.rows() {
            self.send_breakpoint(bp)?;
        }
        for wp in self.watchpoints.rows() {
            self.send_watchpoint(wp)?;
        }
        Ok(())
    }

    // ------------------------------------ incoming messages --------------------------------------

    /// Handle a message from a debuggee. Messages of other processes are dropped.
    pub fn on_incoming_message(&mut self, procid: u64, message: Message) {
        if self.procid() != Some(procid) {
            debug!(
                target: "debugger",
                "drop {} from process {procid}: not a debugged process",
                message.method
            );
            return;
        }
        let method = message.method;
        if let Err(e) = self.dispatch(message) {
            warn!(target: "debugger", "{method}: {e:#}");
        }
    }

    fn dispatch(&mut self, message: Message) -> Result<(), Error> {
        match message.method {
            Method::ResponseLine | Method::ResponseStack => {
                let params: StackParams = message.params()?;
                self.handle_stop(params.stack)?;
            }
            Method::ResponseException => self.handle_exception(message.params()?),
            Method::DebugStartup => self.send_startup_state()?,
            Method::ResponseThreadList => self.hooks.on_thread_list(&message.params()?),
            Method::ResponseThreadSet => self.hooks.on_thread_set(),
            Method::ResponseVariables => self.hooks.on_variables(&message.params()?),
            Method::ResponseVariable => self.hooks.on_variable(&message.params()?),
            Method::ResponseEval => self.hooks.on_eval(&message.params()?),
            Method::ResponseExecOutput => {
                let output: OutputParams = message.params()?;
                info!(target: "debugger", "{}", output.text);
                self.hooks.on_exec_output(&output.text);
            }
            Method::ResponseExecError => {
                let output: OutputParams = message.params()?;
                error!(target: "debugger", "{}", output.text);
                self.hooks.on_exec_error(&output.text);
            }
            Method::ClearBreak => {
                let location: LocationParams = message.params()?;
                self.handle_clear_breakpoint(location);
            }
            Method::ClearWatch => {
                let params: ConditionParams = message.params()?;
                if let Some(idx) = self.watchpoints.index_of_condition(&params.condition) {
                    self.apply_watchpoints(false, |model| model.delete_by_index(idx));
                }
            }
            Method::ResponseBpConditionError => {
                self.handle_breakpoint_condition_error(message.params()?)
            }
            Method::ResponseWatchConditionError => {
                self.handle_watchpoint_condition_error(message.params()?)
            }
            Method::ResponseForkTo => self.handle_fork()?,
            Method::ResponseSyntaxError => {
                let params: SyntaxErrorParams = message.params()?;
                error!(
                    target: "debugger",
                    "syntax error at {}:{}:{}: {}",
                    params.filename, params.line, params.character_number, params.message
                );
                self.hooks.on_syntax_error(&params);
            }
            Method::ResponseSignal => {
                let params: SignalParams = message.params()?;
                error!(
                    target: "debugger",
                    "signal at {}:{}: {}", params.filename, params.line, params.message
                );
                self.hooks.on_signal(&params);
            }
            Method::ResponseCallTrace => self.hooks.on_call_trace(&message.params()?),
            other => {
                warn!(target: "debugger", "unexpected message {other} in {} state", self.state)
            }
        }
        Ok(())
    }

    fn handle_stop(&mut self, stack: Vec<StackFrame>) -> Result<(), Error> {
        if stack.is_empty() {
            warn!(target: "debugger", "stop notification without a stack");
            return Ok(());
        }
        if self.stop_at_first_line {
            self.set_state(DebuggerState::InIde);
            self.hooks.on_line(&stack);
            Ok(())
        } else {
            // first stop is skipped once, later stops are always shown
            self.stop_at_first_line = true;
            self.continue_(false)
        }
    }

    fn handle_exception(&mut self, mut params: ExceptionParams) {
        if let Some(session) = &self.session {
            let script = session.script.to_string_lossy().to_string();
            for frame in params.stack.iter_mut() {
                if frame.filename != "<string>" {
                    break;
                }
                frame.filename = script.clone();
            }
        }

        let unhandled = match &params.exc_type {
            None => true,
            Some(t) => t.to_lowercase().starts_with("unhandled"),
        } || params.stack.is_empty();

        self.set_state(DebuggerState::InIde);
        self.hooks.on_exception(&ExceptionInfo {
            exc_type: params.exc_type,
            message: params.message,
            stack: params.stack,
            unhandled,
        });
    }

    fn handle_clear_breakpoint(&mut self, location: LocationParams) {
        let file = PathBuf::from(&location.filename);
        match self.breakpoints.index_of(&file, location.line) {
            Some(idx) => {
                // debuggee has already forgotten the breakpoint (temporary one was hit)
                self.apply_breakpoints(false, |model| model.delete_by_index(idx));
            }
            None => {
                debug!(
                    target: "debugger",
                    "clear unknown breakpoint {}:{}",
                    location.filename,
                    location.line
                )
            }
        }
    }

    fn handle_breakpoint_condition_error(&mut self, location: LocationParams) {
        error!(
            target: "debugger",
            "The condition of the breakpoint at {}:{} contains a syntax error.",
            location.filename, location.line
        );
        let Some(idx) = self
            .breakpoints
            .index_of(Path::new(&location.filename), location.line)
        else {
            return;
        };
        let Some(old) = self.breakpoints.get(idx).cloned() else {
            return;
        };
        if let Some(edited) = self.hooks.on_breakpoint_condition_error(&old) {
            if edited != old {
                self.update_breakpoints(|model| model.set_by_index(idx, edited));
            }
        }
    }

    fn handle_watchpoint_condition_error(&mut self, params: ConditionParams) {
        error!(
            target: "debugger",
            "The watch expression '{}' contains a syntax error.", params.condition
        );
        let Some(idx) = self.watchpoints.index_of_condition(&params.condition) else {
            return;
        };
        let Some(old) = self.watchpoints.get(idx).cloned() else {
            return;
        };
        if let Some(edited) = self.hooks.on_watchpoint_condition_error(&old) {
            if edited != old {
                self.update_watchpoints(|model| model.set_by_index(idx, edited));
            }
        }
    }

    fn handle_fork(&mut self) -> Result<(), Error> {
        let settings = &self.active_session()?.settings;
        let target = if settings.autofork {
            if settings.follow_child {
                ForkTarget::Child
            } else {
                ForkTarget::Parent
            }
        } else {
            self.hooks.on_fork()
        };
        self.send_with(Method::RequestForkTo, &ForkToRequest { target })
    }

    // ------------------------------------ commands -----------------------------------------------

    /// Step into.
    pub fn step(&mut self) -> Result<(), Error> {
        self.send(Message::new(Method::RequestStep))?;
        self.set_state(DebuggerState::InClient);
        Ok(())
    }

    pub fn step_over(&mut self) -> Result<(), Error> {
        self.send(Message::new(Method::RequestStepOver))?;
        self.set_state(DebuggerState::InClient);
        Ok(())
    }

    pub fn step_out(&mut self) -> Result<(), Error> {
        self.send(Message::new(Method::RequestStepOut))?;
        self.set_state(DebuggerState::InClient);
        Ok(())
    }

    /// Continue execution.
    ///
    /// # Arguments
    ///
    /// * `special`: continue until the current frame returns
    pub fn continue_(&mut self, special: bool) -> Result<(), Error> {
        self.send_with(Method::RequestContinue, &ContinueRequest { special })?;
        self.set_state(DebuggerState::InClient);
        Ok(())
    }

    /// Ask the debuggee to terminate.
    pub fn stop_debugging(&mut self, exit_code: Option<i32>) -> Result<(), Error> {
        self.send_with(Method::RequestStepQuit, &StepQuitRequest { exit_code })
    }

    pub fn remote_breakpoint(
        &self,
        file: &Path,
        line: u32,
        set: bool,
        condition: Option<String>,
        temporary: bool,
    ) -> Result<(), Error> {
        self.send_with(
            Method::RequestBreakpoint,
            &BreakpointRequest {
                filename: file.to_string_lossy().to_string(),
                line,
                set_breakpoint: set,
                condition,
                temporary,
            },
        )
    }

    pub fn remote_breakpoint_enable(
        &self,
        file: &Path,
        line: u32,
        enable: bool,
    ) -> Result<(), Error> {
        self.send_with(
            Method::RequestBreakpointEnable,
            &BreakpointEnableRequest {
                filename: file.to_string_lossy().to_string(),
                line,
                enable,
            },
        )
    }

    pub fn remote_breakpoint_ignore(
        &self,
        file: &Path,
        line: u32,
        count: u32,
    ) -> Result<(), Error> {
        self.send_with(
            Method::RequestBreakpointIgnore,
            &BreakpointIgnoreRequest {
                filename: file.to_string_lossy().to_string(),
                line,
                count,
            },
        )
    }

    pub fn remote_watchpoint(
        &self,
        condition: &str,
        special: WatchSpecial,
        set: bool,
        temporary: bool,
    ) -> Result<(), Error> {
        self.send_with(
            Method::RequestWatch,
            &WatchRequest {
                condition: condition.to_string(),
                special: special.as_wire().to_string(),
                set_watch: set,
                temporary,
            },
        )
    }

    pub fn remote_watchpoint_enable(&self, condition: &str, enable: bool) -> Result<(), Error> {
        self.send_with(
            Method::RequestWatchEnable,
            &WatchEnableRequest {
                condition: condition.to_string(),
                enable,
            },
        )
    }

    pub fn remote_watchpoint_ignore(&self, condition: &str, count: u32) -> Result<(), Error> {
        self.send_with(
            Method::RequestWatchIgnore,
            &WatchIgnoreRequest {
                condition: condition.to_string(),
                count,
            },
        )
    }

    pub fn thread_list(&self) -> Result<(), Error> {
        self.send(Message::new(Method::RequestThreadList))
    }

    pub fn set_thread(&self, thread_id: i64) -> Result<(), Error> {
        self.send_with(Method::RequestThreadSet, &ThreadSetRequest { thread_id })
    }

    /// Request variables of a frame.
    ///
    /// # Arguments
    ///
    /// * `frame_number`: frame index, 0 for the top frame
    /// * `scope`: local or global variables
    /// * `filters`: name patterns of variables to hide
    pub fn variables(
        &self,
        frame_number: u32,
        scope: Scope,
        filters: Vec<String>,
    ) -> Result<(), Error> {
        self.send_with(
            Method::RequestVariables,
            &VariablesRequest {
                frame_number,
                scope,
                filters,
            },
        )
    }

    pub fn variable(
        &self,
        variable: &str,
        frame_number: u32,
        scope: Scope,
        filters: Vec<String>,
    ) -> Result<(), Error> {
        self.send_with(
            Method::RequestVariable,
            &VariableRequest {
                variable: variable.to_string(),
                frame_number,
                scope,
                filters,
            },
        )
    }

    pub fn eval(&self, expression: &str, frame_number: u32) -> Result<(), Error> {
        self.send_with(
            Method::RequestEval,
            &EvalRequest {
                expression: expression.to_string(),
                frame_number,
            },
        )
    }

    pub fn exec(&self, statement: &str, frame_number: u32) -> Result<(), Error> {
        self.send_with(
            Method::RequestExec,
            &ExecRequest {
                statement: statement.to_string(),
                frame_number,
            },
        )
    }

    pub fn call_trace(&self, enable: bool) -> Result<(), Error> {
        self.send_with(Method::RequestCallTrace, &CallTraceRequest { enable })
    }
}

