use crate::common::{
    debugger, message, stack_message, start_session, Project, RecordingSink, TestInfo, PROCID,
};
use cdmdbg::debugger::{DebuggerSettings, DebuggerState};
use cdmdbg::process::params::RunParameters;
use cdmdbg::protocol::params::ForkTarget;
use cdmdbg::protocol::Method;
use cdmdbg::Error;
use serde_json::json;
use serial_test::serial;

#[test]
#[serial]
fn test_second_session_rejected() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    start_session(&mut debugger, &project.script, DebuggerSettings::default());

    let result = debugger.on_debug_session_started(
        PROCID + 1,
        Box::new(RecordingSink::default()),
        &project.script,
        RunParameters::default(),
        DebuggerSettings::default(),
    );
    assert!(matches!(result, Err(Error::SessionState { .. })));
    assert_eq!(debugger.procid(), Some(PROCID));
}

#[test]
#[serial]
fn test_commands_fail_without_session() {
    let info = TestInfo::default();
    let mut debugger = debugger(&info);

    assert!(matches!(debugger.step(), Err(Error::SessionState { .. })));
    assert!(matches!(
        debugger.continue_(false),
        Err(Error::SessionState { .. })
    ));
    assert!(matches!(
        debugger.eval("1 + 1", 0),
        Err(Error::SessionState { .. })
    ));
    assert_eq!(debugger.state(), DebuggerState::Stopped);
    assert!(info.states.borrow().is_empty());
}

#[test]
#[serial]
fn test_first_line_skipped() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    let settings = DebuggerSettings {
        stop_at_first_line: false,
        ..Default::default()
    };
    let sink = start_session(&mut debugger, &project.script, settings);

    debugger.on_incoming_message(
        PROCID,
        stack_message(Method::ResponseLine, &project.script_name(), 1),
    );
    assert_eq!(debugger.state(), DebuggerState::InClient);
    assert_eq!(info.line.get(), None);
    let sent = sink.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, Method::RequestContinue);
    assert_eq!(sent[0].params["special"], json!(false));

    // only the first stop is skipped
    debugger.on_incoming_message(
        PROCID,
        stack_message(Method::ResponseLine, &project.script_name(), 4),
    );
    assert_eq!(debugger.state(), DebuggerState::InIde);
    assert_eq!(info.line.get(), Some(4));
    assert!(sink.take().is_empty());
}

#[test]
#[serial]
fn test_messages_of_other_process_dropped() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    start_session(&mut debugger, &project.script, DebuggerSettings::default());

    debugger.on_incoming_message(
        PROCID + 1,
        stack_message(Method::ResponseLine, &project.script_name(), 1),
    );
    assert_eq!(debugger.state(), DebuggerState::InClient);
    assert_eq!(info.line.get(), None);
}

#[test]
#[serial]
fn test_malformed_message_ignored() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    start_session(&mut debugger, &project.script, DebuggerSettings::default());

    debugger.on_incoming_message(PROCID, message(Method::ResponseLine, json!({"stack": 42})));
    assert_eq!(debugger.state(), DebuggerState::InClient);
    assert_eq!(info.line.get(), None);
}

#[test]
#[serial]
fn test_exception_frames_of_exec_string_replaced() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    start_session(&mut debugger, &project.script, DebuggerSettings::default());

    let frame = |file: &str, line: u32| {
        json!({"filename": file, "line": line, "function": "<module>", "arguments": ""})
    };
    debugger.on_incoming_message(
        PROCID,
        message(
            Method::ResponseException,
            json!({
                "type": "ValueError",
                "message": "bad value",
                "stack": [frame("<string>", 1), frame("<string>", 2), frame("lib.py", 10)],
            }),
        ),
    );

    assert_eq!(debugger.state(), DebuggerState::InIde);
    let exception = info.exception.borrow().clone().unwrap();
    assert!(!exception.unhandled);
    assert_eq!(exception.exc_type.as_deref(), Some("ValueError"));
    assert_eq!(exception.message, "bad value");
    let files: Vec<_> = exception.stack.iter().map(|f| f.filename.as_str()).collect();
    let script = project.script_name();
    assert_eq!(files, vec![script.as_str(), script.as_str(), "lib.py"]);
}

#[test]
#[serial]
fn test_exception_unhandled_detection() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    start_session(&mut debugger, &project.script, DebuggerSettings::default());

    let stack = json!([{"filename": project.script_name(), "line": 4}]);
    let mut unhandled = |params: serde_json::Value| {
        debugger.on_incoming_message(PROCID, message(Method::ResponseException, params));
        info.exception.borrow().clone().unwrap().unhandled
    };

    // empty type string is still a reported type
    assert!(!unhandled(json!({"type": "", "message": "boom", "stack": stack})));
    assert!(unhandled(json!({"message": "boom", "stack": stack})));
    assert!(unhandled(json!({"type": "unhandled SystemExit", "stack": stack})));
    assert!(unhandled(json!({"type": "ValueError", "message": "boom", "stack": []})));
    assert_eq!(debugger.state(), DebuggerState::InIde);
}

#[test]
#[serial]
fn test_fork_asks_hook() {
    let project = Project::new();
    let info = TestInfo::default();
    info.fork_target.set(Some(ForkTarget::Child));
    let mut debugger = debugger(&info);
    let sink = start_session(&mut debugger, &project.script, DebuggerSettings::default());

    debugger.on_incoming_message(PROCID, message(Method::ResponseForkTo, json!({})));

    assert_eq!(info.fork_asked.get(), 1);
    let sent = sink.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, Method::RequestForkTo);
    assert_eq!(sent[0].params["target"], json!("child"));
}

#[test]
#[serial]
fn test_autofork() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    let settings = DebuggerSettings {
        autofork: true,
        follow_child: true,
        ..Default::default()
    };
    let sink = start_session(&mut debugger, &project.script, settings);

    debugger.on_incoming_message(PROCID, message(Method::ResponseForkTo, json!({})));

    assert_eq!(info.fork_asked.get(), 0);
    let sent = sink.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].params["target"], json!("child"));
}

#[test]
#[serial]
fn test_stop_debugging() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    let sink = start_session(&mut debugger, &project.script, DebuggerSettings::default());

    debugger.stop_debugging(Some(3)).unwrap();

    let sent = sink.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, Method::RequestStepQuit);
    assert_eq!(sent[0].params["exitCode"], json!(3));
}

#[test]
#[serial]
fn test_client_flags() {
    let settings = DebuggerSettings {
        report_exceptions: true,
        trace_interpreter: true,
        stop_at_first_line: true,
        autofork: true,
        follow_child: true,
    };
    assert_eq!(
        settings.client_flags(false),
        vec![
            "--report-exceptions",
            "--trace-interpreter",
            "--autofork",
            "--fork-child",
            "--no-redirect"
        ]
    );
    assert!(DebuggerSettings {
        report_exceptions: false,
        ..Default::default()
    }
    .client_flags(true)
    .is_empty());
}
