use crate::error::Error;
use crate::protocol::{LineTransport, Method};
use crate::runmgr::Event;
use log::{debug, info, warn};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Longest accepted handshake line.
const MAX_HANDSHAKE_LINE: usize = 4096;

/// Listening socket served by a dedicated thread.
///
/// Every accepted connection must send `ProcIDInfo` within the read timeout, connections
/// that fail the handshake are closed, successful ones are forwarded to the owner.
/// Handshakes run on their own threads so a slow peer never holds up the others.
pub(super) struct Acceptor {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Acceptor {
    pub(super) fn start(
        listener: TcpListener,
        read_timeout: Duration,
        events: Sender<Event>,
    ) -> Result<Self, Error> {
        let addr = listener.local_addr()?;
        let shutdown = Arc::new(AtomicBool::new(false));

        let stop = shutdown.clone();
        let handle = thread::Builder::new()
            .name("cdm-acceptor".to_string())
            .spawn(move || loop {
                let (stream, peer) = match listener.accept() {
                    Ok(v) => v,
                    Err(err) => {
                        if stop.load(Ordering::SeqCst) {
                            return;
                        }
                        warn!(target: "runmgr", "accept failed: {err:#}");
                        continue;
                    }
                };
                if stop.load(Ordering::SeqCst) {
                    return;
                }

                let events = events.clone();
                let spawned = thread::Builder::new()
                    .name("cdm-handshake".to_string())
                    .spawn(move || match handshake(stream, read_timeout) {
                        Ok((procid, transport)) => {
                            debug!(target: "runmgr", "{peer} claims process {procid}");
                            _ = events.send(Event::Handshake { procid, transport });
                        }
                        Err(err) => {
                            info!(target: "runmgr", "reject connection from {peer}: {err:#}");
                        }
                    });
                if let Err(err) = spawned {
                    warn!(target: "runmgr", "reject connection from {peer}: {err:#}");
                }
            })?;

        Ok(Self {
            addr,
            shutdown,
            handle: Some(handle),
        })
    }

    pub(super) fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl Drop for Acceptor {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // wake up blocked accept
        _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.handle.take() {
            _ = handle.join();
        }
    }
}

/// Read the first line of a connection within `timeout`, expect `ProcIDInfo` with a procid.
fn handshake(stream: TcpStream, timeout: Duration) -> Result<(u64, LineTransport), Error> {
    let mut transport = LineTransport::new(stream)?;

    let message = transport
        .read_message_before(Instant::now() + timeout, MAX_HANDSHAKE_LINE)?
        .ok_or_else(|| Error::Handshake("connection closed before handshake".to_string()))?;
    if message.method != Method::ProcIdInfo {
        return Err(Error::Handshake(format!(
            "expected {}, got {}",
            Method::ProcIdInfo,
            message.method
        )));
    }
    let procid = message
        .procid
        .ok_or_else(|| Error::Handshake("no procid in handshake".to_string()))?;

    transport.set_read_timeout(None)?;
    Ok((procid, transport))
}
