use crate::config::Config;
use crate::debugger::store::{JsonFileStore, StorageScope};
use crate::debugger::DebuggerBuilder;
use crate::process::params::RunParameters;
use crate::process::FinishStatus;
use crate::protocol::params::Scope;
use crate::runmgr::cache::RunParamsCache;
use crate::runmgr::RunManager;
use crate::ui::command::{r#break, watch, Command, CommandError, Launch};
use crate::ui::console::editor::{create_editor, RLHelper};
use crate::ui::console::help::{help_for_command, HELP};
use crate::ui::console::hook::{ConsoleDebuggerHook, ConsoleRunHook};
use crate::ui::console::print::style::{ErrorView, FilePathView, ProcessView};
use crate::ui::console::print::ExternalPrinter;
use crate::workbench::Workbench;
use itertools::Itertools;
use log::warn;
use once_cell::sync::Lazy;
use rustyline::error::ReadlineError;
use rustyline::history::MemHistory;
use rustyline::Editor;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Mutex, Once};
use std::thread;
use std::time::Duration;

mod editor;
mod help;
pub mod hook;
pub mod print;

const WELCOME_TEXT: &str = r#"
cdm-ide console, type `help` for the list of commands
"#;
const PROMT: &str = "(cdm) ";
const TICK: Duration = Duration::from_millis(50);

type CdmEditor = Editor<RLHelper, MemHistory>;

enum Control {
    /// New command from user received
    Cmd(String),
    /// Kill all processes but keep working
    Interrupt,
    /// Terminate application
    Terminate,
}

static CTRL_C_CHAN: Lazy<Mutex<Option<Sender<Control>>>> = Lazy::new(|| Mutex::new(None));

fn ctrl_c_handler() {
    if let Ok(chan) = CTRL_C_CHAN.lock() {
        if let Some(chan) = chan.as_ref() {
            _ = chan.send(Control::Interrupt);
        }
    }
}

pub struct AppBuilder {
    config: Config,
    project: Option<PathBuf>,
    redirected: bool,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            project: None,
            redirected: true,
        }
    }

    /// Keep breakpoints, watchpoints and run parameters inside a project directory.
    pub fn with_project(self, project: Option<PathBuf>) -> Self {
        Self { project, ..self }
    }

    /// Launch scripts with stdio tunneled through the IDE (default) or with inherited stdio.
    pub fn redirected(self, redirected: bool) -> Self {
        Self { redirected, ..self }
    }

    /// Build interactive application.
    pub fn build(self) -> anyhow::Result<ConsoleApplication> {
        let mut editor = create_editor(PROMT)?;
        let run_hook = ConsoleRunHook::new(ExternalPrinter::new(&mut editor)?);
        let debugger_hook = ConsoleDebuggerHook::new(ExternalPrinter::new(&mut editor)?);
        let printer = ExternalPrinter::new(&mut editor)?;
        self.build_with(Some(editor), printer, run_hook, debugger_hook)
    }

    /// Build application that executes a single command and exits when all processes finish.
    pub fn build_batch(self) -> anyhow::Result<ConsoleApplication> {
        let run_hook = ConsoleRunHook::new(ExternalPrinter::stdout());
        let debugger_hook = ConsoleDebuggerHook::new(ExternalPrinter::stdout());
        self.build_with(None, ExternalPrinter::stdout(), run_hook, debugger_hook)
    }

    fn build_with(
        self,
        editor: Option<CdmEditor>,
        printer: ExternalPrinter,
        run_hook: ConsoleRunHook,
        debugger_hook: ConsoleDebuggerHook,
    ) -> anyhow::Result<ConsoleApplication> {
        let scope = match self.project {
            Some(project) => StorageScope::Project(project),
            None => StorageScope::Global,
        };

        let mut builder = DebuggerBuilder::new(debugger_hook);
        if let Some(store) = JsonFileStore::breakpoints(&scope) {
            builder = builder.with_breakpoint_store(store);
        }
        if let Some(store) = JsonFileStore::watchpoints(&scope) {
            builder = builder.with_watchpoint_store(store);
        }

        let mut runs = RunManager::new(self.config)?;
        if let Some(dir) = scope.dir() {
            runs = runs.with_params_cache(RunParamsCache::load(dir.join("run_params.json")));
        }

        let (control_tx, control_rx) = mpsc::channel::<Control>();
        Ok(ConsoleApplication {
            workbench: Workbench::new(runs, builder.build(), run_hook),
            editor,
            printer,
            redirected: self.redirected,
            control_tx,
            control_rx,
        })
    }
}

pub struct ConsoleApplication {
    workbench: Workbench<ConsoleRunHook, ConsoleDebuggerHook>,
    editor: Option<CdmEditor>,
    printer: ExternalPrinter,
    redirected: bool,
    control_tx: Sender<Control>,
    control_rx: Receiver<Control>,
}

pub static HELLO_ONCE: Once = Once::new();

impl ConsoleApplication {
    /// Run application loop.
    ///
    /// # Arguments
    ///
    /// * `initial`: command executed before any user input
    ///
    /// Return status of the last finished process.
    pub fn run(mut self, initial: Option<String>) -> anyhow::Result<Option<FinishStatus>> {
        if let Ok(mut chan) = CTRL_C_CHAN.lock() {
            *chan = Some(self.control_tx.clone());
        }
        static ONCE: Once = Once::new();
        ONCE.call_once(|| {
            _ = ctrlc::set_handler(ctrl_c_handler);
        });

        if let Some(cmd) = initial {
            _ = self.control_tx.send(Control::Cmd(cmd));
        }

        let batch = self.editor.is_none();
        if let Some(mut editor) = self.editor.take() {
            let control_tx = self.control_tx.clone();
            thread::spawn(move || {
                HELLO_ONCE.call_once(|| {
                    println!("{WELCOME_TEXT}");
                });

                loop {
                    match editor.readline(PROMT) {
                        Ok(input) => {
                            if input == "q" || input == "quit" {
                                _ = control_tx.send(Control::Terminate);
                                break;
                            }
                            if input.trim().is_empty() {
                                continue;
                            }
                            _ = editor.add_history_entry(&input);
                            _ = control_tx.send(Control::Cmd(input));
                        }
                        Err(ReadlineError::Interrupted) => {
                            _ = control_tx.send(Control::Interrupt);
                        }
                        Err(ReadlineError::Eof) => {
                            _ = control_tx.send(Control::Terminate);
                            break;
                        }
                        Err(err) => {
                            println!("error: {:#}", err);
                            _ = control_tx.send(Control::Terminate);
                            break;
                        }
                    }
                }
            });
        }

        let mut app_loop = AppLoop {
            workbench: self.workbench,
            printer: self.printer,
            redirected: self.redirected,
        };
        app_loop.run(&self.control_rx, batch);

        if let Ok(mut chan) = CTRL_C_CHAN.lock() {
            *chan = None;
        }
        Ok(app_loop.workbench.hooks().last_status())
    }
}

struct AppLoop {
    workbench: Workbench<ConsoleRunHook, ConsoleDebuggerHook>,
    printer: ExternalPrinter,
    redirected: bool,
}

impl AppLoop {
    fn launch_params(&self, launch: &Launch) -> Option<RunParameters> {
        let cached = self
            .workbench
            .run_manager()
            .params_cache()
            .get(&launch.script)
            .cloned();

        match (&launch.arguments, cached) {
            (Some(arguments), cached) => Some(RunParameters {
                arguments: arguments.clone(),
                redirected: self.redirected,
                ..cached.unwrap_or_default()
            }),
            (None, None) if !self.redirected => Some(RunParameters {
                redirected: false,
                ..RunParameters::default()
            }),
            (None, _) => None,
        }
    }

    fn script_path(script: &Path) -> PathBuf {
        fs::canonicalize(script).unwrap_or_else(|_| script.to_path_buf())
    }

    fn handle_command(&mut self, cmd: &str) -> Result<(), CommandError> {
        match Command::parse(cmd)? {
            Command::Run(mut launch) => {
                launch.script = Self::script_path(&launch.script);
                let params = self.launch_params(&launch);
                let procid = self.workbench.run(&launch.script, params)?;
                self.print_launch(procid, &launch.script);
            }
            Command::Profile(mut launch) => {
                launch.script = Self::script_path(&launch.script);
                let params = self.launch_params(&launch);
                let procid = self.workbench.profile(&launch.script, params)?;
                self.print_launch(procid, &launch.script);
            }
            Command::Debug(mut launch) => {
                launch.script = Self::script_path(&launch.script);
                let params = self.launch_params(&launch);
                let procid = self.workbench.debug(&launch.script, params)?;
                self.print_launch(procid, &launch.script);
            }
            Command::Kill(Some(procid)) => self.workbench.kill(procid)?,
            Command::Kill(None) => self.workbench.kill_all(),
            Command::Processes => {
                let runs = self.workbench.run_manager();
                if runs.process_count() == 0 {
                    self.printer.print("No processes");
                }
                let lines = runs
                    .processes()
                    .map(|p| {
                        format!(
                            "{} {:7} {:10} started {}: {}",
                            ProcessView::from(p.procid()),
                            p.kind().to_string(),
                            p.state().to_string(),
                            p.started_at().format("%H:%M:%S"),
                            FilePathView::from(p.script().display()),
                        )
                    })
                    .join("\n");
                if !lines.is_empty() {
                    self.printer.print(lines);
                }
            }
            Command::Input(text) => {
                let procid = self
                    .workbench
                    .hooks()
                    .take_input_request()
                    .or_else(|| self.workbench.debugger().procid());
                match procid {
                    Some(procid) => self.workbench.user_input(procid, &text)?,
                    None => self.printer.print("No process waits for input"),
                }
            }
            Command::StepInto => self.workbench.debugger_mut().step()?,
            Command::StepOver => self.workbench.debugger_mut().step_over()?,
            Command::StepOut => self.workbench.debugger_mut().step_out()?,
            Command::Continue { special } => self.workbench.debugger_mut().continue_(special)?,
            Command::Stop(exit_code) => self.workbench.debugger_mut().stop_debugging(exit_code)?,
            Command::Breakpoint(cmd) => {
                match r#break::Handler::new(self.workbench.debugger_mut()).handle(cmd)? {
                    r#break::HandlingResult::New(bp) => {
                        self.printer.print(format!("New breakpoint at {bp}"))
                    }
                    r#break::HandlingResult::Removed(bp) => {
                        self.printer.print(format!("Remove breakpoint at {bp}"))
                    }
                    r#break::HandlingResult::Updated(bp) => {
                        self.printer.print(format!("Update breakpoint at {bp}"))
                    }
                    r#break::HandlingResult::Cleared(count) => {
                        self.printer.print(format!("Remove {count} breakpoints"))
                    }
                    r#break::HandlingResult::Dump(brkpts) => {
                        if brkpts.is_empty() {
                            self.printer.print("No breakpoints");
                        }
                        for bp in brkpts {
                            let mut info = vec![];
                            if let Some(condition) = &bp.condition {
                                info.push(format!("if {condition}"));
                            }
                            if bp.temporary {
                                info.push("temporary".to_string());
                            }
                            if !bp.enabled {
                                info.push("disabled".to_string());
                            }
                            if bp.ignore_count > 0 {
                                info.push(format!("ignore {}", bp.ignore_count));
                            }
                            self.printer.print(format!(
                                "- Breakpoint at {}:{} {}",
                                FilePathView::from(bp.file.display()),
                                bp.line,
                                info.join(", ")
                            ));
                        }
                    }
                }
            }
            Command::Watchpoint(cmd) => {
                match watch::Handler::new(self.workbench.debugger_mut()).handle(cmd)? {
                    watch::HandlingResult::New(wp) => {
                        self.printer.print(format!("New watchpoint `{wp}`"))
                    }
                    watch::HandlingResult::Removed(wp) => {
                        self.printer.print(format!("Remove watchpoint `{wp}`"))
                    }
                    watch::HandlingResult::Updated(wp) => {
                        self.printer.print(format!("Update watchpoint `{wp}`"))
                    }
                    watch::HandlingResult::Dump(wps) => {
                        if wps.is_empty() {
                            self.printer.print("No watchpoints");
                        }
                        for wp in wps {
                            let state = if wp.enabled { "" } else { " disabled" };
                            self.printer.print(format!("- Watchpoint `{wp}`{state}"));
                        }
                    }
                }
            }
            Command::ThreadList => self.workbench.debugger().thread_list()?,
            Command::ThreadSwitch(id) => self.workbench.debugger().set_thread(id)?,
            Command::PrintVariables { scope, frame } => {
                self.workbench.debugger().variables(frame, scope, vec![])?
            }
            Command::PrintVariable { name, frame } => {
                let debugger = self.workbench.debugger();
                debugger.variable(&name, frame, Scope::Local, vec![])?
            }
            Command::Eval(expression) => self.workbench.debugger().eval(&expression, 0)?,
            Command::Exec(statement) => self.workbench.debugger().exec(&statement, 0)?,
            Command::CallTrace(enable) => self.workbench.debugger().call_trace(enable)?,
            Command::Help { reason, command } => {
                if let Some(reason) = reason {
                    self.printer.print(reason);
                }
                self.printer.print(help_for_command(command.as_deref()));
            }
        }

        Ok(())
    }

    fn print_launch(&self, procid: u64, script: &Path) {
        self.printer.print(format!(
            "{} launched: {}",
            ProcessView::from(procid),
            FilePathView::from(script.display())
        ));
    }

    fn run(&mut self, control_rx: &Receiver<Control>, batch: bool) {
        let mut started = false;
        loop {
            loop {
                match control_rx.try_recv() {
                    Ok(Control::Cmd(command)) => {
                        started = true;
                        if let Err(e) = self.handle_command(&command) {
                            match e {
                                CommandError::Parsing(_) => {
                                    self.printer.print(ErrorView::from(&e));
                                    self.printer.print(HELP);
                                }
                                CommandError::Handle(ref err) if err.is_fatal() => {
                                    self.printer.print(ErrorView::from(format!(
                                        "fatal error: {e:#}"
                                    )));
                                    self.workbench.kill_all();
                                    return;
                                }
                                CommandError::Handle(_) => {
                                    self.printer.print(ErrorView::from(format!("error: {e:#}")));
                                }
                            }
                        }
                    }
                    Ok(Control::Interrupt) => {
                        if self.workbench.run_manager().process_count() > 0 {
                            warn!(target: "console", "interrupted, killing all processes");
                            self.workbench.kill_all();
                        }
                    }
                    Ok(Control::Terminate) | Err(TryRecvError::Disconnected) => {
                        self.workbench.kill_all();
                        return;
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }

            self.workbench.tick(TICK);

            if batch && started && self.workbench.run_manager().process_count() == 0 {
                return;
            }
        }
    }
}
