use cdmdbg::config::{ClientLauncher, Clients, Config};
use cdmdbg::protocol::{LineTransport, Message, Method};
use cdmdbg::runmgr::{Notification, RunManager};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Client that never connects by itself, a test plays its role over a socket.
pub fn idle_client() -> ClientLauncher {
    ClientLauncher {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), "exec sleep 60".to_string(), "sh".to_string()],
    }
}

pub fn config(clients: Clients) -> Config {
    Config {
        interpreter: "sh".to_string(),
        handshake_timeout_secs: 10,
        reap_timeout_secs: 1,
        kill_all_timeout_secs: 5,
        clients,
        ..Default::default()
    }
}

pub fn idle_clients() -> Clients {
    Clients {
        run: idle_client(),
        profile: idle_client(),
        debug: idle_client(),
    }
}

/// Temporary directory with shell scripts.
pub struct Scripts {
    dir: TempDir,
}

impl Scripts {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn add(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }
}

/// Tick until `done` accepts collected notifications or timeout expires.
pub fn collect_until(
    runs: &mut RunManager,
    timeout: Duration,
    done: impl Fn(&[Notification]) -> bool,
) -> Vec<Notification> {
    let deadline = Instant::now() + timeout;
    let mut collected = vec![];
    while Instant::now() < deadline {
        collected.extend(runs.tick(Duration::from_millis(50)));
        if done(&collected) {
            break;
        }
    }
    collected
}

pub fn finished_of(notifications: &[Notification], procid: u64) -> usize {
    notifications
        .iter()
        .filter(|n| matches!(n, Notification::Finished { procid: id, .. } if *id == procid))
        .count()
}

/// Connect to the run manager and introduce as a launched process.
pub fn connect(port: u16, procid: u64) -> LineTransport {
    let mut transport = LineTransport::connect("127.0.0.1", port).unwrap();
    transport
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    transport
        .write_message(&Message::new(Method::ProcIdInfo).with_procid(procid))
        .unwrap();
    transport
}

/// Read the next message of an expected method.
pub fn expect_message(transport: &mut LineTransport, method: Method) -> Message {
    let message = transport.read_message().unwrap().unwrap();
    assert_eq!(message.method, method);
    message
}
