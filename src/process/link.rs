use crate::error::Error;
use crate::protocol::{LineWriter, Message};
use std::io::ErrorKind;
use std::sync::{Arc, Mutex};

/// Outgoing side of a debuggee connection.
pub trait MessageSink: Send {
    /// Send a message to the debuggee.
    fn send(&self, message: Message) -> Result<(), Error>;
}

/// Socket link shared between a process wrapper and its users.
///
/// Empty until the process completes its handshake, empty again after the wrapper
/// disconnects the socket.
#[derive(Clone)]
pub struct SocketLink {
    procid: u64,
    writer: Arc<Mutex<Option<LineWriter>>>,
}

impl SocketLink {
    pub fn new(procid: u64) -> Self {
        Self {
            procid,
            writer: Arc::default(),
        }
    }

    pub fn procid(&self) -> u64 {
        self.procid
    }

    pub fn is_connected(&self) -> bool {
        self.writer.lock().map(|w| w.is_some()).unwrap_or(false)
    }

    pub(crate) fn attach(&self, writer: LineWriter) {
        if let Ok(mut guard) = self.writer.lock() {
            *guard = Some(writer);
        }
    }

    /// Shutdown the socket and forget it.
    pub(crate) fn detach(&self) {
        if let Ok(mut guard) = self.writer.lock() {
            if let Some(writer) = guard.take() {
                writer.shutdown();
            }
        }
    }
}

impl MessageSink for SocketLink {
    fn send(&self, message: Message) -> Result<(), Error> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| Error::NotConnected(self.procid))?;
        let writer = guard.as_mut().ok_or(Error::NotConnected(self.procid))?;
        log::trace!(target: "protocol", "process {}: send {}", self.procid, message.method);
        writer
            .write_message(&message.with_procid(self.procid))
            .map_err(|e| match e {
                Error::IO(io)
                    if matches!(
                        io.kind(),
                        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::NotConnected
                    ) =>
                {
                    Error::Disconnected(self.procid)
                }
                e => e,
            })
    }
}
