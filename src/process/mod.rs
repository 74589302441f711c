pub mod link;
pub mod params;

use crate::error::Error;
use crate::process::link::{MessageSink, SocketLink};
use crate::process::params::LaunchCommand;
use crate::protocol::params::InputParams;
use crate::protocol::{LineTransport, Message, Method};
use chrono::{DateTime, Local};
use log::{debug, warn};
use nix::sys::signal::{self, Signal};
use std::fmt::{Display, Formatter};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use strum_macros::Display as StrumDisplay;
use sysinfo::System;

static NEXT_PROCID: AtomicU64 = AtomicU64::new(1);

/// Return next process-wide unique launch identifier.
pub fn next_procid() -> u64 {
    NEXT_PROCID.fetch_add(1, Ordering::Relaxed)
}

const REAP_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum ProcessKind {
    Run,
    Profile,
    Debug,
}

/// Lifecycle state of a wrapped process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum WrapperState {
    /// Spawned, waiting for the handshake.
    Prologue,
    Running,
    Finished,
}

/// How a process session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishStatus {
    ExitCode(i32),
    Killed,
    Disconnected,
    FailedToStart,
}

impl Display for FinishStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FinishStatus::ExitCode(code) => write!(f, "Script finished with exit code {code}"),
            FinishStatus::Killed => f.write_str("Script killed"),
            FinishStatus::Disconnected => f.write_str("Connection lost to the script process"),
            FinishStatus::FailedToStart => f.write_str("Script failed to start"),
        }
    }
}

/// Event produced by a socket reader thread.
#[derive(Debug)]
pub enum SocketEvent {
    Message(Message),
    Closed,
}

/// Exit code of a reaped process, `128 + signal` for signaled ones.
fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

/// Return pids of all descendants of a process, deepest first.
fn descendants(pid: u32) -> Vec<u32> {
    let mut sys = System::new();
    sys.refresh_processes();

    let mut result = vec![];
    let mut parents = vec![pid];
    while let Some(parent) = parents.pop() {
        for (child_pid, process) in sys.processes() {
            if process.parent().map(|p| p.as_u32()) == Some(parent) {
                result.push(child_pid.as_u32());
                parents.push(child_pid.as_u32());
            }
        }
    }
    result.reverse();
    result
}

/// OS process bound to its control socket.
pub struct RemoteProcess {
    procid: u64,
    kind: ProcessKind,
    script: PathBuf,
    redirected: bool,
    connecting: bool,
    command: LaunchCommand,
    child: Option<Child>,
    link: SocketLink,
    state: WrapperState,
    started_at: DateTime<Local>,
    profile_output: Option<PathBuf>,
}

impl RemoteProcess {
    /// Create a wrapper, process is not spawned until [`RemoteProcess::start`].
    ///
    /// # Arguments
    ///
    /// * `procid`: launch identifier, carried by the handshake
    /// * `kind`: run, profile or debug
    /// * `script`: path to the script
    /// * `redirected`: whether the script stdio is tunneled through the socket
    /// * `command`: resolved launch command
    pub fn new(
        procid: u64,
        kind: ProcessKind,
        script: &Path,
        redirected: bool,
        command: LaunchCommand,
    ) -> Self {
        Self {
            procid,
            kind,
            script: script.to_path_buf(),
            redirected,
            connecting: redirected || kind == ProcessKind::Debug,
            command,
            child: None,
            link: SocketLink::new(procid),
            state: WrapperState::Prologue,
            started_at: Local::now(),
            profile_output: None,
        }
    }

    pub fn with_profile_output(mut self, path: PathBuf) -> Self {
        self.profile_output = Some(path);
        self
    }

    pub fn procid(&self) -> u64 {
        self.procid
    }

    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    pub fn is_redirected(&self) -> bool {
        self.redirected
    }

    /// True if process must connect back to the IDE.
    pub fn is_connecting(&self) -> bool {
        self.connecting
    }

    pub fn state(&self) -> WrapperState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn profile_output(&self) -> Option<&Path> {
        self.profile_output.as_deref()
    }

    pub fn link(&self) -> &SocketLink {
        &self.link
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(|c| c.id())
    }

    /// Spawn OS process.
    pub fn start(&mut self) -> Result<(), Error> {
        let line = self.command.command_line();
        debug!(target: "runmgr", "process {}: spawn {line}", self.procid);
        let child = self
            .command
            .to_command()
            .spawn()
            .map_err(|e| Error::Spawn(line, e))?;
        self.child = Some(child);
        self.started_at = Local::now();
        Ok(())
    }

    /// Bind the process to its accepted connection.
    ///
    /// Spawns a reader thread that reports every decoded message and connection close into
    /// `on_event`, then sends the initial go-ahead so the blocked client starts executing.
    pub fn set_socket<F>(&mut self, transport: LineTransport, mut on_event: F) -> Result<(), Error>
    where
        F: FnMut(SocketEvent) + Send + 'static,
    {
        let procid = self.procid;
        let (mut reader, writer) = transport.split();
        self.link.attach(writer);

        thread::Builder::new()
            .name(format!("cdm-reader-{procid}"))
            .spawn(move || loop {
                match reader.read_message() {
                    Ok(Some(message)) => on_event(SocketEvent::Message(message)),
                    Ok(None) => {
                        on_event(SocketEvent::Closed);
                        return;
                    }
                    Err(Error::Protocol(e)) => {
                        warn!(target: "protocol", "process {procid}: drop malformed line: {e}")
                    }
                    Err(e) => {
                        debug!(target: "protocol", "process {procid}: read error: {e:#}");
                        on_event(SocketEvent::Closed);
                        return;
                    }
                }
            })?;

        self.state = WrapperState::Running;
        self.link.send(Message::new(Method::RequestRun))
    }

    /// Send a line of user input to a redirected process.
    pub fn user_input(&self, input: &str) -> Result<(), Error> {
        let message = Message::with_params(
            Method::RequestStdin,
            &InputParams {
                input: input.to_string(),
            },
        )?;
        self.link.send(message)
    }

    /// Disconnect the socket and kill the process with all of its descendants.
    ///
    /// Return [`FinishStatus::Killed`] on the first call and `None` if process is already finished.
    pub fn stop(&mut self) -> Option<FinishStatus> {
        if self.state == WrapperState::Finished {
            return None;
        }
        self.state = WrapperState::Finished;
        self.link.detach();
        self.kill();
        Some(FinishStatus::Killed)
    }

    /// Mark process finished. Return `false` if it was already finished.
    pub fn mark_finished(&mut self) -> bool {
        let was_running = self.state != WrapperState::Finished;
        self.state = WrapperState::Finished;
        self.link.detach();
        was_running
    }

    fn kill(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        for pid in descendants(child.id()) {
            let pid = nix::unistd::Pid::from_raw(pid as i32);
            if let Err(errno) = signal::kill(pid, Signal::SIGKILL) {
                debug!(target: "runmgr", "kill descendant {pid}: {errno}");
            }
        }
        if let Err(e) = child.kill() {
            debug!(target: "runmgr", "process {}: kill: {e}", self.procid);
        }
        if let Err(e) = child.wait() {
            warn!(target: "runmgr", "process {}: reap: {e}", self.procid);
        }
    }

    /// Wait for the process exit, kill it if it is still alive after `timeout`.
    /// Return exit code if process exited by itself.
    pub fn wait(&mut self, timeout: Duration) -> Option<i32> {
        let deadline = Instant::now() + timeout;
        loop {
            let child = self.child.as_mut()?;
            match child.try_wait() {
                Ok(Some(status)) => {
                    self.child = None;
                    return Some(exit_code(status));
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(REAP_POLL_INTERVAL),
                Ok(None) => {
                    warn!(
                        target: "runmgr",
                        "process {} still alive after {timeout:?}, killing",
                        self.procid
                    );
                    self.kill();
                    return None;
                }
                Err(e) => {
                    warn!(target: "runmgr", "process {}: wait: {e}", self.procid);
                    self.kill();
                    return None;
                }
            }
        }
    }

    /// Non-blocking reap, return exit code if process is finished.
    pub fn wait_detached(&mut self) -> Option<i32> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                self.child = None;
                Some(exit_code(status))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(target: "runmgr", "process {}: wait: {e}", self.procid);
                None
            }
        }
    }
}

impl Drop for RemoteProcess {
    fn drop(&mut self) {
        if self.child.is_some() && self.connecting {
            self.link.detach();
            self.kill();
        }
    }
}
