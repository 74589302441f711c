use crate::config::Config;
use crate::debugger::{DebuggerHook, DebuggerServer, DebuggerState};
use crate::error::Error;
use crate::process::params::RunParameters;
use crate::process::{FinishStatus, ProcessKind};
use crate::runmgr::{Notification, ProfilingResults, RunManager};
use std::path::Path;
use std::time::Duration;

/// Observer of launched processes.
pub trait RunHook {
    fn on_started(&self, _procid: u64) {}

    fn on_stdout(&self, _procid: u64, _text: &str) {}

    fn on_stderr(&self, _procid: u64, _text: &str) {}

    /// Process waits for input, answer with [`Workbench::user_input`].
    fn on_input_request(&self, _procid: u64, _prompt: &str, _echo: bool) {}

    fn on_ide_message(&self, _procid: u64, _message: &str) {}

    fn on_profiling_results(&self, _results: &ProfilingResults) {}

    fn on_finished(&self, _procid: u64, _kind: ProcessKind, _status: FinishStatus) {}
}

/// IDE side core: run manager plus debugger, driven from a single thread.
pub struct Workbench<R: RunHook, D: DebuggerHook> {
    runs: RunManager,
    debugger: DebuggerServer<D>,
    hooks: R,
}

impl<R: RunHook, D: DebuggerHook> Workbench<R, D> {
    pub fn new(runs: RunManager, debugger: DebuggerServer<D>, hooks: R) -> Self {
        Self {
            runs,
            debugger,
            hooks,
        }
    }

    pub fn from_config(
        config: Config,
        debugger: DebuggerServer<D>,
        hooks: R,
    ) -> Result<Self, Error> {
        Ok(Self::new(RunManager::new(config)?, debugger, hooks))
    }

    pub fn run_manager(&self) -> &RunManager {
        &self.runs
    }

    pub fn run_manager_mut(&mut self) -> &mut RunManager {
        &mut self.runs
    }

    pub fn debugger(&self) -> &DebuggerServer<D> {
        &self.debugger
    }

    pub fn debugger_mut(&mut self) -> &mut DebuggerServer<D> {
        &mut self.debugger
    }

    pub fn hooks(&self) -> &R {
        &self.hooks
    }

    pub fn run(&mut self, script: &Path, params: Option<RunParameters>) -> Result<u64, Error> {
        self.runs.run(script, params)
    }

    pub fn profile(&mut self, script: &Path, params: Option<RunParameters>) -> Result<u64, Error> {
        self.runs.profile(script, params)
    }

    /// Start a debug session, fails if another one is active.
    pub fn debug(&mut self, script: &Path, params: Option<RunParameters>) -> Result<u64, Error> {
        if self.debugger.state() != DebuggerState::Stopped {
            return Err(Error::SessionState {
                expected: "stopped",
                actual: self.debugger.state(),
            });
        }

        let settings = self.runs.config().debugger.clone();
        let launch = self.runs.debug(script, params, &settings)?;
        if let Err(e) = self.debugger.on_debug_session_started(
            launch.procid,
            Box::new(launch.link),
            script,
            launch.params,
            settings,
        ) {
            crate::muted_error!(self.runs.kill(launch.procid));
            return Err(e);
        }
        Ok(launch.procid)
    }

    pub fn kill(&mut self, procid: u64) -> Result<(), Error> {
        self.runs.kill(procid)?;
        self.tick(Duration::ZERO);
        Ok(())
    }

    pub fn kill_all(&mut self) {
        let notifications = self.runs.kill_all();
        self.dispatch(notifications);
    }

    pub fn user_input(&mut self, procid: u64, input: &str) -> Result<(), Error> {
        self.runs.user_input(procid, input)
    }

    /// Process pending events, waits up to `timeout` for the first one.
    pub fn tick(&mut self, timeout: Duration) {
        let notifications = self.runs.tick(timeout);
        self.dispatch(notifications);
    }

    fn dispatch(&mut self, notifications: Vec<Notification>) {
        for notification in notifications {
            match notification {
                Notification::Started { procid } => self.hooks.on_started(procid),
                Notification::Stdout { procid, text } => self.hooks.on_stdout(procid, &text),
                Notification::Stderr { procid, text } => self.hooks.on_stderr(procid, &text),
                Notification::InputRequest {
                    procid,
                    prompt,
                    echo,
                } => self.hooks.on_input_request(procid, &prompt, echo),
                Notification::IdeMessage { procid, message } => {
                    self.hooks.on_ide_message(procid, &message)
                }
                Notification::DebugMessage { procid, message } => {
                    self.debugger.on_incoming_message(procid, message)
                }
                Notification::ProfilingResults(results) => {
                    self.hooks.on_profiling_results(&results)
                }
                Notification::Finished {
                    procid,
                    kind,
                    status,
                } => {
                    self.debugger.on_process_finished(procid, status);
                    self.hooks.on_finished(procid, kind, status);
                }
            }
        }
    }
}
