use crate::debugger::breakpoint::Breakpoint;
use crate::debugger::watchpoint::Watchpoint;
use crate::debugger::{DebuggerHook, DebuggerState, ExceptionInfo};
use crate::process::{FinishStatus, ProcessKind};
use crate::protocol::params::{
    CallEvent, CallTraceParams, EvalParams, ForkTarget, Scope, SignalParams, StackFrame,
    SyntaxErrorParams, ThreadListParams, VariableInfo, VariableParams, VariablesParams,
};
use crate::runmgr::ProfilingResults;
use crate::ui::console::print::style::{
    ErrorView, FilePathView, FunctionNameView, KeywordView, ProcessView, StderrView,
};
use crate::ui::console::print::ExternalPrinter;
use crate::workbench::RunHook;
use std::cell::Cell;
use std::fs;

/// Prints process events into the console.
pub struct ConsoleRunHook {
    printer: ExternalPrinter,
    /// Process that waits for user input.
    input_request: Cell<Option<u64>>,
    last_status: Cell<Option<FinishStatus>>,
}

impl ConsoleRunHook {
    pub fn new(printer: ExternalPrinter) -> Self {
        Self {
            printer,
            input_request: Cell::new(None),
            last_status: Cell::new(None),
        }
    }

    /// Take id of the process waiting for input.
    pub fn take_input_request(&self) -> Option<u64> {
        self.input_request.take()
    }

    /// Status of the last finished process.
    pub fn last_status(&self) -> Option<FinishStatus> {
        self.last_status.get()
    }
}

impl RunHook for ConsoleRunHook {
    fn on_started(&self, procid: u64) {
        self.printer
            .print(format!("{} started", ProcessView::from(procid)));
    }

    fn on_stdout(&self, _procid: u64, text: &str) {
        self.printer.print(text.trim_end_matches('\n'));
    }

    fn on_stderr(&self, _procid: u64, text: &str) {
        self.printer
            .print(StderrView::from(text.trim_end_matches('\n')));
    }

    fn on_input_request(&self, procid: u64, prompt: &str, echo: bool) {
        self.input_request.set(Some(procid));
        let hidden = if echo { "" } else { " (input is not echoed)" };
        self.printer.print(format!(
            "{} waits for input{hidden}, use `input <text>`: {prompt}",
            ProcessView::from(procid)
        ));
    }

    fn on_ide_message(&self, procid: u64, message: &str) {
        self.printer
            .print(format!("{}: {message}", ProcessView::from(procid)));
    }

    fn on_profiling_results(&self, results: &ProfilingResults) {
        self.printer.print(format!(
            "{} profiling results: {} ({} - {})",
            ProcessView::from(results.procid),
            FilePathView::from(results.output.display()),
            results.started.format("%H:%M:%S"),
            results.finished.format("%H:%M:%S"),
        ));
    }

    fn on_finished(&self, procid: u64, kind: ProcessKind, status: FinishStatus) {
        if self.input_request.get() == Some(procid) {
            self.input_request.set(None);
        }
        self.last_status.set(Some(status));
        self.printer
            .print(format!("{} ({kind}): {status}", ProcessView::from(procid)));
    }
}

/// Read a line of a source file.
fn source_line(file: &str, line: u32) -> Option<String> {
    let source = fs::read_to_string(file).ok()?;
    let text = source.lines().nth(line.checked_sub(1)? as usize)?;
    Some(text.trim_end().to_string())
}

fn render_frame(num: usize, frame: &StackFrame) -> String {
    format!(
        "#{num} {}:{} in {}({})",
        FilePathView::from(&frame.filename),
        frame.line,
        FunctionNameView::from(&frame.function),
        frame.arguments
    )
}

fn render_variable(var: &VariableInfo) -> String {
    if var.var_type.is_empty() {
        format!("{} = {}", KeywordView::from(&var.name), var.value)
    } else {
        format!(
            "{} = {} ({})",
            KeywordView::from(&var.name),
            var.value,
            var.var_type
        )
    }
}

/// Prints debug session events into the console.
pub struct ConsoleDebuggerHook {
    printer: ExternalPrinter,
}

impl ConsoleDebuggerHook {
    pub fn new(printer: ExternalPrinter) -> Self {
        Self { printer }
    }
}

impl DebuggerHook for ConsoleDebuggerHook {
    fn on_state_changed(&self, state: DebuggerState) {
        if state == DebuggerState::Stopped {
            self.printer.print("Debug session finished");
        }
    }

    fn on_line(&self, stack: &[StackFrame]) {
        let Some(top) = stack.first() else {
            return;
        };
        self.printer.print(format!(
            "Stopped at {}:{} in {}",
            FilePathView::from(&top.filename),
            top.line,
            FunctionNameView::from(&top.function),
        ));
        if let Some(text) = source_line(&top.filename, top.line) {
            self.printer.print(format!("{:>5} {text}", top.line));
        }
    }

    fn on_exception(&self, exception: &ExceptionInfo) {
        let kind = if exception.unhandled {
            "Unhandled exception"
        } else {
            "Exception"
        };
        let exc_type = exception.exc_type.as_deref().unwrap_or_default();
        self.printer.print(ErrorView::from(format!(
            "{kind} {exc_type}: {}",
            exception.message
        )));
        for (num, frame) in exception.stack.iter().enumerate() {
            self.printer.print(render_frame(num, frame));
        }
    }

    fn on_thread_list(&self, threads: &ThreadListParams) {
        for thread in &threads.thread_list {
            let marker = if thread.id == threads.current_id {
                "*"
            } else {
                " "
            };
            let broken = if thread.broken { " (broken)" } else { "" };
            self.printer
                .print(format!("{marker} {} {}{broken}", thread.id, thread.name));
        }
    }

    fn on_thread_set(&self) {
        self.printer.print("Thread switched");
    }

    fn on_variables(&self, variables: &VariablesParams) {
        let scope = match variables.scope {
            Scope::Local => "locals",
            Scope::Global => "globals",
        };
        if variables.variables.is_empty() {
            self.printer.print(format!("no {scope}"));
        }
        for var in &variables.variables {
            self.printer.print(render_variable(var));
        }
    }

    fn on_variable(&self, variable: &VariableParams) {
        if variable.variables.is_empty() {
            self.printer
                .print(format!("{} is not found", KeywordView::from(&variable.variable)));
        }
        for var in &variable.variables {
            self.printer.print(render_variable(var));
        }
    }

    fn on_eval(&self, result: &EvalParams) {
        match (&result.result, &result.error) {
            (_, Some(error)) => self.printer.print(ErrorView::from(error)),
            (Some(value), None) => self.printer.print(value),
            (None, None) => self.printer.print("None"),
        }
    }

    fn on_exec_output(&self, text: &str) {
        self.printer.print(text.trim_end_matches('\n'));
    }

    fn on_exec_error(&self, text: &str) {
        self.printer
            .print(ErrorView::from(text.trim_end_matches('\n')));
    }

    fn on_syntax_error(&self, error: &SyntaxErrorParams) {
        self.printer.print(ErrorView::from(format!(
            "Syntax error at {}:{}:{}: {}",
            error.filename, error.line, error.character_number, error.message
        )));
    }

    fn on_signal(&self, signal: &SignalParams) {
        self.printer.print(ErrorView::from(format!(
            "Signal at {}:{}: {}",
            signal.filename, signal.line, signal.message
        )));
    }

    fn on_call_trace(&self, event: &CallTraceParams) {
        let arrow = match event.event {
            CallEvent::Call => "->",
            CallEvent::Return => "<-",
        };
        self.printer.print(format!(
            "{arrow} {} ({}:{}) from {} ({}:{})",
            FunctionNameView::from(&event.to.code_name),
            event.to.filename,
            event.to.line,
            FunctionNameView::from(&event.from.code_name),
            event.from.filename,
            event.from.line,
        ));
    }

    fn on_fork(&self) -> ForkTarget {
        self.printer
            .print("Debugged script forked, following the parent process");
        ForkTarget::Parent
    }

    fn on_breakpoint_condition_error(&self, breakpoint: &Breakpoint) -> Option<Breakpoint> {
        self.printer.print(ErrorView::from(format!(
            "Condition of breakpoint {breakpoint} is invalid, use `break` to replace it"
        )));
        None
    }

    fn on_watchpoint_condition_error(&self, watchpoint: &Watchpoint) -> Option<Watchpoint> {
        self.printer.print(ErrorView::from(format!(
            "Watch expression `{watchpoint}` is invalid, use `watch` to replace it"
        )));
        None
    }
}
