//! Debuggee side run client.
//!
//! Connects back to the IDE, runs a program with its stdio tunneled through the socket
//! and reports the program exit code.

use crate::error::Error;
use crate::protocol::params::{ExitParams, InputParams, OutputParams};
use crate::protocol::{LineReader, LineTransport, LineWriter, Message, Method};
use anyhow::{anyhow, bail, Context};
use log::{debug, info, warn};
use std::io::{Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long to wait for the IDE go-ahead and for the exit acknowledgement.
const PROLOGUE_TIMEOUT: Duration = Duration::from_secs(5);
const EPILOGUE_TIMEOUT: Duration = Duration::from_secs(5);
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Where to connect and what to run.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub host: String,
    pub port: u16,
    pub procid: u64,
    /// Program and its arguments.
    pub argv: Vec<String>,
}

/// Messages from the IDE that matter to the main loop.
enum Control {
    Shutdown,
    Closed,
}

type SharedWriter = Arc<Mutex<LineWriter>>;

fn send(writer: &SharedWriter, message: Message) -> Result<(), Error> {
    let mut writer = writer
        .lock()
        .map_err(|_| Error::Launch("writer lock poisoned".to_string()))?;
    writer.write_message(&message)
}

/// Connect to the IDE and complete the handshake.
fn connect(options: &ClientOptions) -> anyhow::Result<LineTransport> {
    let mut transport = LineTransport::connect(&options.host, options.port)
        .with_context(|| format!("connect to {}:{}", options.host, options.port))?;
    transport.write_message(&Message::new(Method::ProcIdInfo).with_procid(options.procid))?;

    transport.set_read_timeout(Some(PROLOGUE_TIMEOUT))?;
    match transport.read_message() {
        Ok(Some(message)) if message.method == Method::RequestRun => {}
        Ok(Some(message)) => bail!(
            "unexpected {} instead of {}",
            message.method,
            Method::RequestRun
        ),
        Ok(None) => bail!("IDE closed the connection during handshake"),
        Err(e) => return Err(anyhow!(e).context("no go-ahead from the IDE")),
    }
    transport.set_read_timeout(None)?;
    Ok(transport)
}

/// Incremental utf-8 decoder, keeps an incomplete trailing sequence until more bytes come.
#[derive(Default)]
struct Utf8Chunks {
    pending: Vec<u8>,
}

impl Utf8Chunks {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut text = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    text.push_str(valid);
                    self.pending.clear();
                    return text;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return text;
                        }
                    }
                }
            }
        }
    }

    /// Remaining bytes at the end of the stream.
    fn finish(self) -> String {
        String::from_utf8_lossy(&self.pending).into_owned()
    }
}

/// Forward a child output stream as chunks.
fn forward_output(
    mut source: impl Read + Send + 'static,
    method: Method,
    procid: u64,
    writer: SharedWriter,
) -> JoinHandle<()> {
    let send_text = move |text: String| -> bool {
        if text.is_empty() {
            return true;
        }
        match Message::with_params(method, &OutputParams { text }) {
            Ok(m) => send(&writer, m.with_procid(procid)).is_ok(),
            Err(_) => true,
        }
    };

    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        let mut chunks = Utf8Chunks::default();
        loop {
            let n = match source.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            if !send_text(chunks.push(&buf[..n])) {
                return;
            }
        }
        send_text(chunks.finish());
    })
}

/// Read IDE messages: user input goes into child stdin, the rest drives the main loop.
fn serve_ide(mut reader: LineReader, mut stdin: Option<ChildStdin>, control: Sender<Control>) {
    thread::spawn(move || loop {
        match reader.read_message() {
            Ok(Some(message)) => match message.method {
                Method::RequestStdin => {
                    let Ok(params) = message.params::<InputParams>() else {
                        continue;
                    };
                    if let Some(stdin) = stdin.as_mut() {
                        if let Err(e) = stdin
                            .write_all(params.input.as_bytes())
                            .and_then(|_| stdin.flush())
                        {
                            debug!(target: "client", "write child stdin: {e}");
                        }
                    }
                }
                Method::RequestShutdown => {
                    _ = control.send(Control::Shutdown);
                }
                other => debug!(target: "client", "ignore {other}"),
            },
            Ok(None) => {
                _ = control.send(Control::Closed);
                return;
            }
            Err(Error::Protocol(e)) => warn!(target: "client", "drop malformed line: {e}"),
            Err(_) => {
                _ = control.send(Control::Closed);
                return;
            }
        }
    });
}

/// Wait for the child, kill it if the IDE goes away. Return exit code.
fn wait_child(child: &mut Child, control: &Receiver<Control>) -> anyhow::Result<i32> {
    use std::os::unix::process::ExitStatusExt;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status
                .code()
                .or_else(|| status.signal().map(|sig| 128 + sig))
                .unwrap_or(-1));
        }
        match control.recv_timeout(CHILD_POLL_INTERVAL) {
            Ok(Control::Closed) | Err(RecvTimeoutError::Disconnected) => {
                warn!(target: "client", "IDE connection lost, killing the program");
                _ = child.kill();
                _ = child.wait();
                bail!("IDE connection lost");
            }
            Ok(Control::Shutdown) | Err(RecvTimeoutError::Timeout) => {}
        }
    }
}

/// Run a program on behalf of the IDE. Return the program exit code.
pub fn run(options: ClientOptions) -> anyhow::Result<i32> {
    let (program, args) = options
        .argv
        .split_first()
        .ok_or_else(|| anyhow!("nothing to run"))?;

    let (reader, writer) = connect(&options)?.split();
    let writer: SharedWriter = Arc::new(Mutex::new(writer));

    let (stdout_reader, stdout_writer) = os_pipe::pipe()?;
    let (stderr_reader, stderr_writer) = os_pipe::pipe()?;
    let mut child = {
        // write ends must be closed in this process once the child holds them
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(stdout_writer)
            .stderr(stderr_writer);
        match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let text = format!("{program}: {e}\n");
                let message = Message::with_params(Method::ResponseStderr, &OutputParams { text })?;
                _ = send(&writer, message.with_procid(options.procid));
                report_exit(&writer, options.procid, 127, None)?;
                return Ok(127);
            }
        }
    };
    info!(target: "client", "process {} started: {program}", options.procid);

    let outputs = [
        forward_output(stdout_reader, Method::ResponseStdout, options.procid, writer.clone()),
        forward_output(stderr_reader, Method::ResponseStderr, options.procid, writer.clone()),
    ];
    let (control_tx, control) = mpsc::channel();
    serve_ide(reader, child.stdin.take(), control_tx);

    let code = wait_child(&mut child, &control)?;
    for handle in outputs {
        _ = handle.join();
    }
    report_exit(&writer, options.procid, code, Some(&control))?;
    Ok(code)
}

/// Send exit code and wait for the acknowledgement.
fn report_exit(
    writer: &SharedWriter,
    procid: u64,
    exit_code: i32,
    control: Option<&Receiver<Control>>,
) -> anyhow::Result<()> {
    send(
        writer,
        Message::with_params(Method::ResponseExit, &ExitParams { exit_code })?.with_procid(procid),
    )?;
    if let Some(control) = control {
        match control.recv_timeout(EPILOGUE_TIMEOUT) {
            Ok(Control::Shutdown) => {}
            Ok(Control::Closed) | Err(_) => {
                debug!(target: "client", "no exit acknowledgement from the IDE")
            }
        }
    }
    Ok(())
}
