//! Launches scripts and supervises them until they finish.

mod acceptor;
pub mod cache;

use crate::config::{ClientLauncher, Config};
use crate::debugger::DebuggerSettings;
use crate::error::Error;
use crate::process::link::{MessageSink, SocketLink};
use crate::process::params::{Endpoint, LaunchPlan, RunParameters};
use crate::process::{
    next_procid, FinishStatus, ProcessKind, RemoteProcess, SocketEvent, WrapperState,
};
use crate::protocol::params::{ExitParams, InputRequestParams, OutputParams};
use crate::protocol::{LineTransport, Message, Method};
use crate::runmgr::acceptor::Acceptor;
use crate::runmgr::cache::RunParamsCache;
use crate::{muted_error, weak_error};
use chrono::{DateTime, Local};
use indexmap::IndexMap;
use log::{error, info, warn};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

const KILL_ALL_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Internal event, produced by helper threads.
pub(crate) enum Event {
    Handshake { procid: u64, transport: LineTransport },
    Socket { procid: u64, event: SocketEvent },
}

/// Results of a finished profiling session.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilingResults {
    pub procid: u64,
    pub script: PathBuf,
    /// cProfile output file.
    pub output: PathBuf,
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    pub redirected: bool,
}

/// Notification about launched processes.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Process completed the handshake.
    Started { procid: u64 },
    Stdout { procid: u64, text: String },
    Stderr { procid: u64, text: String },
    /// Process waits for a line of user input.
    InputRequest { procid: u64, prompt: String, echo: bool },
    /// Message for the IDE console.
    IdeMessage { procid: u64, message: String },
    /// Debugger traffic of a debug launch.
    DebugMessage { procid: u64, message: Message },
    ProfilingResults(ProfilingResults),
    /// Emitted exactly once per launch.
    Finished {
        procid: u64,
        kind: ProcessKind,
        status: FinishStatus,
    },
}

/// Socket connected debug launch.
pub struct DebugLaunch {
    pub procid: u64,
    pub link: SocketLink,
    pub params: RunParameters,
}

/// Owner of all launched processes and of the listening socket they connect back to.
pub struct RunManager {
    config: Config,
    acceptor: Acceptor,
    events: Receiver<Event>,
    events_tx: Sender<Event>,
    processes: IndexMap<u64, RemoteProcess>,
    /// Launches waiting for a handshake.
    prologue: Vec<(u64, Instant)>,
    pending: Vec<Notification>,
    params_cache: RunParamsCache,
}

impl RunManager {
    /// Bind listening socket and start accepting connections.
    pub fn new(config: Config) -> Result<Self, Error> {
        let listener = TcpListener::bind((config.host.as_str(), 0)).map_err(Error::Listen)?;
        let (events_tx, events) = mpsc::channel();
        let acceptor = Acceptor::start(
            listener,
            config.handshake_read_timeout(),
            events_tx.clone(),
        )?;
        info!(target: "runmgr", "listening on {}:{}", config.host, acceptor.port());

        Ok(Self {
            config,
            acceptor,
            events,
            events_tx,
            processes: IndexMap::new(),
            prologue: vec![],
            pending: vec![],
            params_cache: RunParamsCache::new(),
        })
    }

    pub fn with_params_cache(mut self, params_cache: RunParamsCache) -> Self {
        self.params_cache = params_cache;
        self
    }

    /// Port of the listening socket.
    pub fn port(&self) -> u16 {
        self.acceptor.port()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn params_cache(&self) -> &RunParamsCache {
        &self.params_cache
    }

    pub fn params_cache_mut(&mut self) -> &mut RunParamsCache {
        &mut self.params_cache
    }

    pub fn process(&self, procid: u64) -> Option<&RemoteProcess> {
        self.processes.get(&procid)
    }

    /// Live processes in launch order.
    pub fn processes(&self) -> impl Iterator<Item = &RemoteProcess> {
        self.processes.values()
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Number of processes bound (or to be bound) to a socket.
    pub fn connected_count(&self) -> usize {
        self.processes.values().filter(|p| p.is_connecting()).count()
    }

    /// Outgoing link of a process.
    pub fn link(&self, procid: u64) -> Option<SocketLink> {
        self.processes.get(&procid).map(|p| p.link().clone())
    }

    // ------------------------------------ launch -------------------------------------------------

    /// Run a script.
    ///
    /// # Arguments
    ///
    /// * `script`: path to the script
    /// * `params_override`: parameters that replace (and are remembered instead of) the cached ones
    pub fn run(
        &mut self,
        script: &Path,
        params_override: Option<RunParameters>,
    ) -> Result<u64, Error> {
        let params = self.params_cache.resolve(script, params_override);
        self.launch(ProcessKind::Run, script, params, vec![])
    }

    /// Run a script under cProfile.
    pub fn profile(
        &mut self,
        script: &Path,
        params_override: Option<RunParameters>,
    ) -> Result<u64, Error> {
        let params = self.params_cache.resolve(script, params_override);
        self.launch(ProcessKind::Profile, script, params, vec![])
    }

    /// Start a script under the debug client, the launch always connects back.
    pub fn debug(
        &mut self,
        script: &Path,
        params_override: Option<RunParameters>,
        settings: &DebuggerSettings,
    ) -> Result<DebugLaunch, Error> {
        let params = self.params_cache.resolve(script, params_override);
        let flags = settings.client_flags(params.redirected);
        let procid = self.launch(ProcessKind::Debug, script, params.clone(), flags)?;
        let link = self.link(procid).ok_or(Error::ProcessNotFound(procid))?;
        Ok(DebugLaunch {
            procid,
            link,
            params,
        })
    }

    fn launcher(&self, kind: ProcessKind) -> &ClientLauncher {
        match kind {
            ProcessKind::Run => &self.config.clients.run,
            ProcessKind::Profile => &self.config.clients.profile,
            ProcessKind::Debug => &self.config.clients.debug,
        }
    }

    fn launch(
        &mut self,
        kind: ProcessKind,
        script: &Path,
        params: RunParameters,
        client_flags: Vec<String>,
    ) -> Result<u64, Error> {
        let procid = next_procid();
        let connecting = params.redirected || kind == ProcessKind::Debug;
        let profile_output = (kind == ProcessKind::Profile)
            .then(|| self.config.profile_dir().join(format!("{procid}.cprof")));

        let plan = LaunchPlan {
            kind,
            script,
            params: &params,
            interpreter: &self.config.interpreter,
            client: connecting.then(|| {
                (
                    self.launcher(kind),
                    Endpoint {
                        host: self.config.host.clone(),
                        port: self.port(),
                        procid,
                    },
                )
            }),
            client_flags,
            profile_output: profile_output.as_deref(),
        };
        let command = match plan.build() {
            Ok(command) => command,
            Err(e) => {
                self.failed_to_start(procid, kind, &e);
                return Err(e);
            }
        };

        let mut process = RemoteProcess::new(procid, kind, script, params.redirected, command);
        if let Some(output) = profile_output {
            process = process.with_profile_output(output);
        }
        if let Err(e) = process.start() {
            self.failed_to_start(procid, kind, &e);
            return Err(e);
        }

        info!(target: "runmgr", "process {procid}: {kind} {}", script.display());
        if connecting {
            self.prologue.push((procid, Instant::now()));
        }
        self.processes.insert(procid, process);
        Ok(procid)
    }

    fn failed_to_start(&mut self, procid: u64, kind: ProcessKind, err: &Error) {
        error!(target: "runmgr", "process {procid}: {err:#}");
        self.pending.push(Notification::IdeMessage {
            procid,
            message: format!("{}: {err}", FinishStatus::FailedToStart),
        });
        self.pending.push(Notification::Finished {
            procid,
            kind,
            status: FinishStatus::FailedToStart,
        });
    }

    // ------------------------------------ control ------------------------------------------------

    /// Kill a process.
    pub fn kill(&mut self, procid: u64) -> Result<(), Error> {
        let process = self
            .processes
            .get_mut(&procid)
            .ok_or(Error::ProcessNotFound(procid))?;
        if let Some(status) = process.stop() {
            self.finish(procid, status);
        }
        Ok(())
    }

    /// Kill every connected process and wait until all of them are reaped.
    /// Return notifications collected meanwhile.
    pub fn kill_all(&mut self) -> Vec<Notification> {
        let connected: Vec<u64> = self
            .processes
            .values()
            .filter(|p| p.is_connecting())
            .map(|p| p.procid())
            .collect();
        for procid in connected {
            muted_error!(self.kill(procid));
        }

        let deadline = Instant::now() + self.config.kill_all_timeout();
        while self.connected_count() > 0 {
            if Instant::now() >= deadline {
                warn!(
                    target: "runmgr",
                    "{} processes are still alive after kill",
                    self.connected_count()
                );
                break;
            }
            self.pump(KILL_ALL_POLL_INTERVAL);
            thread::yield_now();
        }

        std::mem::take(&mut self.pending)
    }

    /// Send a line of user input to a redirected process.
    pub fn user_input(&mut self, procid: u64, input: &str) -> Result<(), Error> {
        self.processes
            .get(&procid)
            .ok_or(Error::ProcessNotFound(procid))?
            .user_input(input)
    }

    /// Process helper thread events (waiting up to `timeout` for the first one), police
    /// handshake timeouts and reap detached processes.
    pub fn tick(&mut self, timeout: Duration) -> Vec<Notification> {
        self.pump(timeout);
        self.police_prologue();
        self.reap_detached();
        std::mem::take(&mut self.pending)
    }

    fn pump(&mut self, timeout: Duration) {
        let first = match self.events.recv_timeout(timeout) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return,
        };
        self.on_event(first);
        while let Ok(event) = self.events.try_recv() {
            self.on_event(event);
        }
    }

    fn on_event(&mut self, event: Event) {
        match event {
            Event::Handshake { procid, transport } => self.on_handshake(procid, transport),
            Event::Socket { procid, event } => self.on_socket_event(procid, event),
        }
    }

    fn on_handshake(&mut self, procid: u64, transport: LineTransport) {
        let process = self
            .processes
            .get_mut(&procid)
            .filter(|p| p.is_connecting() && p.state() == WrapperState::Prologue);
        let Some(process) = process else {
            warn!(target: "runmgr", "unsolicited connection for process {procid}, closing");
            transport.shutdown();
            return;
        };

        let events = self.events_tx.clone();
        let bind = process.set_socket(transport, move |event| {
            _ = events.send(Event::Socket { procid, event });
        });
        self.prologue.retain(|(id, _)| *id != procid);

        match bind {
            Ok(()) => {
                info!(target: "runmgr", "process {procid} connected");
                self.pending.push(Notification::Started { procid });
                self.pending.push(Notification::IdeMessage {
                    procid,
                    message: "Script started".to_string(),
                });
            }
            Err(e) => {
                warn!(target: "runmgr", "process {procid}: bind socket: {e:#}");
                if let Some(status) = process.stop() {
                    self.finish(procid, status);
                }
            }
        }
    }

    fn on_socket_event(&mut self, procid: u64, event: SocketEvent) {
        let Some(process) = self.processes.get_mut(&procid) else {
            // late traffic of a finished process
            return;
        };

        match event {
            SocketEvent::Closed => {
                if process.stop().is_some() {
                    warn!(target: "runmgr", "process {procid}: connection lost");
                    self.finish(procid, FinishStatus::Disconnected);
                }
            }
            SocketEvent::Message(message) => {
                if let Err(e) = self.on_message(procid, message) {
                    warn!(target: "runmgr", "process {procid}: {e:#}");
                }
            }
        }
    }

    fn on_message(&mut self, procid: u64, message: Message) -> Result<(), Error> {
        let kind = self
            .processes
            .get(&procid)
            .map(|p| p.kind())
            .ok_or(Error::ProcessNotFound(procid))?;

        match message.method {
            Method::ResponseExit => {
                let params: ExitParams = message.params()?;
                self.on_exit(procid, params.exit_code);
            }
            Method::ResponseStdout => {
                let params: OutputParams = message.params()?;
                self.pending.push(Notification::Stdout {
                    procid,
                    text: params.text,
                });
            }
            Method::ResponseStderr => {
                let params: OutputParams = message.params()?;
                self.pending.push(Notification::Stderr {
                    procid,
                    text: params.text,
                });
            }
            Method::ResponseStdin => {
                let params: InputRequestParams = message.params()?;
                self.pending.push(Notification::InputRequest {
                    procid,
                    prompt: params.prompt,
                    echo: params.echo,
                });
            }
            _ if kind == ProcessKind::Debug => {
                self.pending
                    .push(Notification::DebugMessage { procid, message });
            }
            other => {
                warn!(target: "runmgr", "process {procid}: unexpected {other} for a {kind} launch");
            }
        }
        Ok(())
    }

    /// Client reported exit code: acknowledge, reap and finish.
    fn on_exit(&mut self, procid: u64, exit_code: i32) {
        let reap_timeout = self.config.reap_timeout();
        let Some(process) = self.processes.get_mut(&procid) else {
            return;
        };
        weak_error!(
            process.link().send(Message::new(Method::RequestShutdown)),
            "acknowledge exit:"
        );
        process.wait(reap_timeout);
        if process.mark_finished() {
            self.finish(procid, FinishStatus::ExitCode(exit_code));
        }
    }

    /// Remove a finished process and report its completion.
    fn finish(&mut self, procid: u64, status: FinishStatus) {
        let Some(process) = self.processes.shift_remove(&procid) else {
            return;
        };
        self.prologue.retain(|(id, _)| *id != procid);
        info!(target: "runmgr", "process {procid}: {status}");

        if let (ProcessKind::Profile, FinishStatus::ExitCode(_), Some(output)) =
            (process.kind(), status, process.profile_output())
        {
            self.pending
                .push(Notification::ProfilingResults(ProfilingResults {
                    procid,
                    script: process.script().to_path_buf(),
                    output: output.to_path_buf(),
                    started: process.started_at(),
                    finished: Local::now(),
                    redirected: process.is_redirected(),
                }));
        }
        self.pending.push(Notification::Finished {
            procid,
            kind: process.kind(),
            status,
        });
    }

    fn police_prologue(&mut self) {
        let timeout = self.config.handshake_timeout();
        let now = Instant::now();
        let mut expired = vec![];
        let processes = &self.processes;
        self.prologue.retain(|(procid, started)| {
            match processes.get(procid) {
                Some(p) if p.state() == WrapperState::Prologue => {
                    if now.duration_since(*started) >= timeout {
                        expired.push(*procid);
                        false
                    } else {
                        true
                    }
                }
                _ => false,
            }
        });

        for procid in expired {
            error!(target: "runmgr", "{}", Error::HandshakeTimeout { procid, timeout });
            self.pending.push(Notification::IdeMessage {
                procid,
                message: "Timeout: the process did not start; killing the process.".to_string(),
            });
            if let Some(status) = self.processes.get_mut(&procid).and_then(|p| p.stop()) {
                self.finish(procid, status);
            }
        }
    }

    fn reap_detached(&mut self) {
        let reaped: Vec<(u64, i32)> = self
            .processes
            .values_mut()
            .filter(|p| !p.is_connecting())
            .filter_map(|p| p.wait_detached().map(|code| (p.procid(), code)))
            .collect();

        for (procid, code) in reaped {
            if let Some(process) = self.processes.get_mut(&procid) {
                process.mark_finished();
            }
            self.finish(procid, FinishStatus::ExitCode(code));
        }
    }
}

impl Drop for RunManager {
    fn drop(&mut self) {
        self.kill_all();
    }
}
