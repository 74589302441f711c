mod common;


use crate::common::{
    collect_until, config, connect, expect_message, finished_of, idle_clients, Scripts,
};
use cdmdbg::config::{ClientLauncher, Clients};
use cdmdbg::process::params::RunParameters;
use cdmdbg::process::{FinishStatus, ProcessKind};
use cdmdbg::protocol::{LineTransport, Message, Method};
use cdmdbg::runmgr::cache::RunParamsCache;
use cdmdbg::runmgr::{Notification, RunManager};
use cdmdbg::Error;
use serde_json::json;
use serial_test::serial;
use std::io::Write;
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(10);

#[test]
#[serial]
fn test_handshake_and_exit() {
    let scripts = Scripts::new();
    let script = scripts.add("main.sh", "exit 0\n");
    let mut runs = RunManager::new(config(idle_clients())).unwrap();

    let procid = runs.run(&script, None).unwrap();
    let mut client = connect(runs.port(), procid);

    let notifications = collect_until(&mut runs, TIMEOUT, |n| {
        n.contains(&Notification::Started { procid })
    });
    assert!(notifications.contains(&Notification::Started { procid }));
    expect_message(&mut client, Method::RequestRun);

    let stdout = Message::with_params(Method::ResponseStdout, &json!({"text": "hello\n"})).unwrap();
    client.write_message(&stdout.with_procid(procid)).unwrap();
    let exit = Message::with_params(Method::ResponseExit, &json!({"exitCode": 3})).unwrap();
    client.write_message(&exit.with_procid(procid)).unwrap();

    let notifications = collect_until(&mut runs, TIMEOUT, |n| finished_of(n, procid) > 0);
    assert_eq!(
        notifications,
        vec![
            Notification::Stdout {
                procid,
                text: "hello\n".to_string()
            },
            Notification::Finished {
                procid,
                kind: ProcessKind::Run,
                status: FinishStatus::ExitCode(3)
            }
        ]
    );
    expect_message(&mut client, Method::RequestShutdown);

    // process is gone, nothing is reported twice
    assert!(matches!(runs.kill(procid), Err(Error::ProcessNotFound(_))));
    assert!(runs.tick(Duration::from_millis(100)).is_empty());
    assert_eq!(runs.process_count(), 0);
}

#[test]
#[serial]
fn test_unsolicited_connection_rejected() {
    let mut runs = RunManager::new(config(idle_clients())).unwrap();

    let mut client = connect(runs.port(), 424242);
    assert!(runs.tick(Duration::from_secs(1)).is_empty());
    assert!(!matches!(client.read_message(), Ok(Some(_))));
}

#[test]
#[serial]
fn test_handshake_without_procid_rejected() {
    let scripts = Scripts::new();
    let script = scripts.add("main.sh", "exit 0\n");
    let mut runs = RunManager::new(config(idle_clients())).unwrap();
    let procid = runs.run(&script, None).unwrap();

    let mut client = LineTransport::connect("127.0.0.1", runs.port()).unwrap();
    client
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    client
        .write_message(&Message::new(Method::ProcIdInfo))
        .unwrap();

    assert!(!matches!(client.read_message(), Ok(Some(_))));
    assert!(runs.tick(Duration::from_millis(200)).is_empty());
    assert!(runs.process(procid).is_some());
}

#[test]
#[serial]
fn test_slow_peer_does_not_delay_handshake() {
    let scripts = Scripts::new();
    let script = scripts.add("main.sh", "exit 0\n");
    let mut runs = RunManager::new(config(idle_clients())).unwrap();
    let procid = runs.run(&script, None).unwrap();

    // a peer that never finishes its handshake line
    let mut slow = TcpStream::connect(("127.0.0.1", runs.port())).unwrap();
    let trickle = thread::spawn(move || {
        for _ in 0..30 {
            if slow.write_all(b"{").is_err() {
                return;
            }
            thread::sleep(Duration::from_millis(100));
        }
    });
    thread::sleep(Duration::from_millis(200));

    let start = Instant::now();
    let _client = connect(runs.port(), procid);
    let notifications = collect_until(&mut runs, TIMEOUT, |n| {
        n.contains(&Notification::Started { procid })
    });
    assert!(notifications.contains(&Notification::Started { procid }));
    assert!(start.elapsed() < Duration::from_secs(2));

    trickle.join().unwrap();
}

#[test]
#[serial]
fn test_handshake_timeout() {
    let scripts = Scripts::new();
    let script = scripts.add("main.sh", "exit 0\n");
    let mut cfg = config(idle_clients());
    cfg.handshake_timeout_secs = 1;
    let mut runs = RunManager::new(cfg).unwrap();

    let procid = runs.run(&script, None).unwrap();
    let notifications = collect_until(&mut runs, TIMEOUT, |n| finished_of(n, procid) > 0);

    assert!(notifications.iter().any(|n| matches!(
        n,
        Notification::IdeMessage { procid: id, message }
            if *id == procid && message.starts_with("Timeout")
    )));
    assert_eq!(
        notifications.last(),
        Some(&Notification::Finished {
            procid,
            kind: ProcessKind::Run,
            status: FinishStatus::Killed
        })
    );
    assert_eq!(runs.process_count(), 0);
}

#[test]
#[serial]
fn test_connection_lost() {
    let scripts = Scripts::new();
    let script = scripts.add("main.sh", "exit 0\n");
    let mut runs = RunManager::new(config(idle_clients())).unwrap();

    let procid = runs.run(&script, None).unwrap();
    let mut client = connect(runs.port(), procid);
    collect_until(&mut runs, TIMEOUT, |n| n.contains(&Notification::Started { procid }));
    expect_message(&mut client, Method::RequestRun);
    drop(client);

    let notifications = collect_until(&mut runs, TIMEOUT, |n| finished_of(n, procid) > 0);
    assert_eq!(
        notifications.last(),
        Some(&Notification::Finished {
            procid,
            kind: ProcessKind::Run,
            status: FinishStatus::Disconnected
        })
    );
}

#[test]
#[serial]
fn test_invalid_utf8_line_dropped() {
    let scripts = Scripts::new();
    let script = scripts.add("main.sh", "exit 0\n");
    let mut runs = RunManager::new(config(idle_clients())).unwrap();

    let procid = runs.run(&script, None).unwrap();
    let mut client = TcpStream::connect(("127.0.0.1", runs.port())).unwrap();
    let handshake = Message::new(Method::ProcIdInfo).with_procid(procid);
    client.write_all(&handshake.encode().unwrap()).unwrap();
    collect_until(&mut runs, TIMEOUT, |n| n.contains(&Notification::Started { procid }));

    client.write_all(b"\xff\xfe garbage\n").unwrap();
    let stdout = Message::with_params(Method::ResponseStdout, &json!({"text": "still here"}))
        .unwrap()
        .with_procid(procid);
    client.write_all(&stdout.encode().unwrap()).unwrap();

    let notifications = collect_until(&mut runs, TIMEOUT, |n| {
        n.iter().any(|n| matches!(n, Notification::Stdout { .. }))
    });
    assert!(notifications.contains(&Notification::Stdout {
        procid,
        text: "still here".to_string()
    }));
    assert_eq!(finished_of(&notifications, procid), 0);
    assert!(runs.process(procid).is_some());
}

#[test]
#[serial]
fn test_kill() {
    let scripts = Scripts::new();
    let script = scripts.add("main.sh", "exit 0\n");
    let mut runs = RunManager::new(config(idle_clients())).unwrap();

    let procid = runs.run(&script, None).unwrap();
    runs.kill(procid).unwrap();
    let notifications = runs.tick(Duration::ZERO);
    assert_eq!(
        notifications,
        vec![Notification::Finished {
            procid,
            kind: ProcessKind::Run,
            status: FinishStatus::Killed
        }]
    );
    assert!(matches!(runs.kill(procid), Err(Error::ProcessNotFound(_))));
}

#[test]
#[serial]
fn test_kill_then_late_exit() {
    let scripts = Scripts::new();
    let script = scripts.add("main.sh", "exit 0\n");
    let mut runs = RunManager::new(config(idle_clients())).unwrap();

    let procid = runs.run(&script, None).unwrap();
    let mut client = connect(runs.port(), procid);
    collect_until(&mut runs, TIMEOUT, |n| n.contains(&Notification::Started { procid }));
    expect_message(&mut client, Method::RequestRun);

    runs.kill(procid).unwrap();
    let exit = Message::with_params(Method::ResponseExit, &json!({"exitCode": 0})).unwrap();
    _ = client.write_message(&exit.with_procid(procid));

    let mut notifications = runs.tick(Duration::ZERO);
    notifications.extend(collect_until(&mut runs, Duration::from_millis(500), |_| false));
    assert_eq!(finished_of(&notifications, procid), 1);
    assert!(notifications.contains(&Notification::Finished {
        procid,
        kind: ProcessKind::Run,
        status: FinishStatus::Killed
    }));
}

#[test]
#[serial]
fn test_kill_all() {
    let scripts = Scripts::new();
    let script = scripts.add("main.sh", "exit 0\n");
    let mut runs = RunManager::new(config(idle_clients())).unwrap();

    let first = runs.run(&script, None).unwrap();
    let second = runs.profile(&script, None).unwrap();
    assert_ne!(first, second);
    assert_eq!(runs.connected_count(), 2);

    let _first_client = connect(runs.port(), first);
    let _second_client = connect(runs.port(), second);
    let started = collect_until(&mut runs, TIMEOUT, |n| {
        n.contains(&Notification::Started { procid: first })
            && n.contains(&Notification::Started { procid: second })
    });
    assert!(started.contains(&Notification::Started { procid: first }));
    assert!(started.contains(&Notification::Started { procid: second }));

    let notifications = runs.kill_all();
    assert_eq!(finished_of(&notifications, first), 1);
    assert_eq!(finished_of(&notifications, second), 1);
    // killed profiling session has no results
    assert!(!notifications
        .iter()
        .any(|n| matches!(n, Notification::ProfilingResults(_))));
    assert_eq!(runs.process_count(), 0);
}

#[test]
#[serial]
fn test_detached_run() {
    let scripts = Scripts::new();
    let script = scripts.add("main.sh", "exit 4\n");
    let mut runs = RunManager::new(config(idle_clients())).unwrap();

    let params = RunParameters {
        redirected: false,
        ..Default::default()
    };
    let procid = runs.run(&script, Some(params.clone())).unwrap();
    assert_eq!(runs.connected_count(), 0);
    assert_eq!(runs.params_cache().get(&script), Some(&params));

    let notifications = collect_until(&mut runs, TIMEOUT, |n| finished_of(n, procid) > 0);
    assert_eq!(
        notifications,
        vec![Notification::Finished {
            procid,
            kind: ProcessKind::Run,
            status: FinishStatus::ExitCode(4)
        }]
    );
}

#[test]
#[serial]
fn test_params_cache_persisted() {
    let scripts = Scripts::new();
    let script = scripts.add("main.sh", "exit 0\n");
    let cache_file = scripts.add("run_params.json", "");
    let mut runs = RunManager::new(config(idle_clients()))
        .unwrap()
        .with_params_cache(RunParamsCache::load(&cache_file));

    let params = RunParameters {
        arguments: "--verbose".to_string(),
        redirected: false,
        ..Default::default()
    };
    let procid = runs.run(&script, Some(params.clone())).unwrap();
    collect_until(&mut runs, TIMEOUT, |n| finished_of(n, procid) > 0);

    let reloaded = RunParamsCache::load(&cache_file);
    assert_eq!(reloaded.get(&script), Some(&params));
}

#[test]
#[serial]
fn test_failed_to_start() {
    let scripts = Scripts::new();
    let script = scripts.add("main.sh", "exit 0\n");
    let mut runs = RunManager::new(config(idle_clients())).unwrap();

    let params = RunParameters {
        interpreter: Some("cdm-no-such-interpreter".to_string()),
        ..Default::default()
    };
    let result = runs.run(&script, Some(params));
    assert!(matches!(result, Err(Error::InterpreterNotFound(..))));

    let notifications = runs.tick(Duration::ZERO);
    assert_eq!(notifications.len(), 2);
    assert!(matches!(notifications[0], Notification::IdeMessage { .. }));
    assert!(matches!(
        notifications[1],
        Notification::Finished {
            status: FinishStatus::FailedToStart,
            ..
        }
    ));
}

#[test]
#[serial]
fn test_user_input_forwarded() {
    let scripts = Scripts::new();
    let script = scripts.add("main.sh", "exit 0\n");
    let mut runs = RunManager::new(config(idle_clients())).unwrap();

    let procid = runs.run(&script, None).unwrap();
    let mut client = connect(runs.port(), procid);
    collect_until(&mut runs, TIMEOUT, |n| n.contains(&Notification::Started { procid }));
    expect_message(&mut client, Method::RequestRun);

    let request = Message::with_params(
        Method::ResponseStdin,
        &json!({"prompt": "name? ", "echo": true}),
    )
    .unwrap();
    client.write_message(&request.with_procid(procid)).unwrap();
    let notifications = collect_until(&mut runs, TIMEOUT, |n| !n.is_empty());
    assert_eq!(
        notifications,
        vec![Notification::InputRequest {
            procid,
            prompt: "name? ".to_string(),
            echo: true
        }]
    );

    runs.user_input(procid, "Guido").unwrap();
    let input = expect_message(&mut client, Method::RequestStdin);
    assert_eq!(input.params["input"], json!("Guido"));
}

#[test]
#[serial]
fn test_redirected_run_with_client() {
    let scripts = Scripts::new();
    let script = scripts.add(
        "main.sh",
        "echo \"hello $1\"\necho oops >&2\nexit 5\n",
    );
    let client = ClientLauncher {
        program: env!("CARGO_BIN_EXE_cdm-run").to_string(),
        args: vec![],
    };
    let clients = Clients {
        run: client.clone(),
        profile: client.clone(),
        debug: client,
    };
    let mut runs = RunManager::new(config(clients)).unwrap();

    let params = RunParameters {
        arguments: "world".to_string(),
        ..Default::default()
    };
    let procid = runs.run(&script, Some(params)).unwrap();
    let notifications = collect_until(&mut runs, TIMEOUT, |n| finished_of(n, procid) > 0);

    assert!(notifications.contains(&Notification::Started { procid }));
    let text = |stderr: bool| {
        notifications
            .iter()
            .filter_map(|n| match n {
                Notification::Stdout { text, .. } if !stderr => Some(text.as_str()),
                Notification::Stderr { text, .. } if stderr => Some(text.as_str()),
                _ => None,
            })
            .collect::<String>()
    };
    assert_eq!(text(false), "hello world\n");
    assert_eq!(text(true), "oops\n");
    assert_eq!(
        notifications.last(),
        Some(&Notification::Finished {
            procid,
            kind: ProcessKind::Run,
            status: FinishStatus::ExitCode(5)
        })
    );
}

#[test]
#[serial]
fn test_multibyte_output_across_reads() {
    let scripts = Scripts::new();
    // 4095 ascii bytes put the two byte `é` across the client read buffer edge
    let script = scripts.add(
        "main.sh",
        "printf '%4095s' '' | tr ' ' a\nprintf '\\303\\251\\n'\n",
    );
    let client = ClientLauncher {
        program: env!("CARGO_BIN_EXE_cdm-run").to_string(),
        args: vec![],
    };
    let clients = Clients {
        run: client.clone(),
        profile: client.clone(),
        debug: client,
    };
    let mut runs = RunManager::new(config(clients)).unwrap();

    let procid = runs.run(&script, None).unwrap();
    let notifications = collect_until(&mut runs, TIMEOUT, |n| finished_of(n, procid) > 0);

    let stdout: String = notifications
        .iter()
        .filter_map(|n| match n {
            Notification::Stdout { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(stdout, format!("{}é\n", "a".repeat(4095)));
}
