use crate::common::{
    debugger, message, start_session, AllLines, Project, TestHooks, TestInfo, PROCID,
};
use cdmdbg::debugger::breakpoint::Breakpoint;
use cdmdbg::debugger::store::{JsonFileStore, Store};
use cdmdbg::debugger::{DebuggerBuilder, DebuggerSettings};
use cdmdbg::process::FinishStatus;
use cdmdbg::protocol::Method;
use cdmdbg::ui::command::r#break::{Command, Handler, HandlingResult};
use cdmdbg::Error;
use serde_json::json;
use serial_test::serial;
use std::fs;

#[test]
#[serial]
fn test_breakpoints_pushed_on_startup() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    debugger.update_breakpoints(|model| {
        model.add(Breakpoint::new(&project.script, 4).with_condition("x > 0"));
        model.add(Breakpoint::new(&project.script, 5).disabled());
    });

    let sink = start_session(&mut debugger, &project.script, DebuggerSettings::default());
    assert!(sink.take().is_empty());

    debugger.on_incoming_message(PROCID, message(Method::DebugStartup, json!({})));

    let sent = sink.take();
    let methods: Vec<_> = sent.iter().map(|m| m.method).collect();
    assert_eq!(
        methods,
        vec![
            Method::RequestBreakpoint,
            Method::RequestBreakpoint,
            Method::RequestBreakpointEnable
        ]
    );
    assert_eq!(sent[0].params["filename"], json!(project.script_name()));
    assert_eq!(sent[0].params["line"], json!(4));
    assert_eq!(sent[0].params["setBreakpoint"], json!(true));
    assert_eq!(sent[0].params["condition"], json!("x > 0"));
    assert_eq!(sent[1].params["line"], json!(5));
    assert_eq!(sent[2].params["enable"], json!(false));
}

#[test]
#[serial]
fn test_breakpoint_changes_mirrored() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    let sink = start_session(&mut debugger, &project.script, DebuggerSettings::default());

    debugger.update_breakpoints(|model| model.add(Breakpoint::new(&project.script, 4)));
    let sent = sink.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, Method::RequestBreakpoint);
    assert_eq!(sent[0].params["setBreakpoint"], json!(true));

    // update is a clear of the old breakpoint followed by a set of the new one
    debugger.update_breakpoints(|model| model.set_enabled_by_index(0, false));
    let sent = sink.take();
    let methods: Vec<_> = sent.iter().map(|m| m.method).collect();
    assert_eq!(
        methods,
        vec![
            Method::RequestBreakpoint,
            Method::RequestBreakpoint,
            Method::RequestBreakpointEnable
        ]
    );
    assert_eq!(sent[0].params["setBreakpoint"], json!(false));
    assert_eq!(sent[1].params["setBreakpoint"], json!(true));
    assert_eq!(sent[2].params["enable"], json!(false));

    debugger.update_breakpoints(|model| model.delete_by_index(0));
    let sent = sink.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].params["setBreakpoint"], json!(false));
    assert!(debugger.breakpoints().is_empty());
}

#[test]
#[serial]
fn test_breakpoint_changes_not_mirrored_after_session() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    let sink = start_session(&mut debugger, &project.script, DebuggerSettings::default());
    debugger.on_process_finished(PROCID, FinishStatus::ExitCode(0));

    debugger.update_breakpoints(|model| model.add(Breakpoint::new(&project.script, 4)));
    assert!(sink.take().is_empty());
    assert_eq!(debugger.breakpoints().len(), 1);
}

#[test]
#[serial]
fn test_clear_break_not_echoed() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    let sink = start_session(&mut debugger, &project.script, DebuggerSettings::default());
    debugger.update_breakpoints(|model| {
        model.add(Breakpoint::new(&project.script, 4).temporary(true))
    });
    sink.take();

    debugger.on_incoming_message(
        PROCID,
        message(
            Method::ClearBreak,
            json!({"filename": project.script_name(), "line": 4}),
        ),
    );

    assert!(debugger.breakpoints().is_empty());
    assert!(sink.take().is_empty());
}

#[test]
#[serial]
fn test_invalid_breakpoints_dropped_on_load() {
    let project = Project::new();
    let store = JsonFileStore::new(project.dir.path().join("breakpoints.json"));
    let stored = vec![
        // empty line
        Breakpoint::new(&project.script, 2),
        Breakpoint::new(project.dir.path().join("missing.py"), 1),
        Breakpoint::new(&project.script, 5),
    ];
    store.save(stored.as_slice()).unwrap();

    let info = TestInfo::default();
    let debugger = DebuggerBuilder::new(TestHooks::new(info.clone()))
        .with_breakpoint_store(store.clone())
        .build();

    assert_eq!(
        debugger.breakpoints().rows(),
        &[Breakpoint::new(&project.script, 5)]
    );
    let saved: Vec<Breakpoint> = store.load().unwrap();
    assert_eq!(saved, vec![Breakpoint::new(&project.script, 5)]);
}

#[test]
#[serial]
fn test_invalid_breakpoints_dropped_on_session_start() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    debugger.update_breakpoints(|model| {
        model.add(Breakpoint::new(&project.script, 4));
        model.add(Breakpoint::new(&project.script, 7));
    });

    // line 4 becomes a comment
    fs::write(
        &project.script,
        "import sys\n\ndef main():\n    # x = 1\n    print(1)\n\nmain()\n",
    )
    .unwrap();

    let sink = start_session(&mut debugger, &project.script, DebuggerSettings::default());
    assert_eq!(
        debugger.breakpoints().rows(),
        &[Breakpoint::new(&project.script, 7)]
    );
    assert!(sink.take().is_empty());
}

#[test]
#[serial]
fn test_breakpoint_condition_error() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    debugger.update_breakpoints(|model| {
        model.add(Breakpoint::new(&project.script, 4).with_condition("x >"))
    });
    let sink = start_session(&mut debugger, &project.script, DebuggerSettings::default());

    let location = json!({"filename": project.script_name(), "line": 4});

    // hook declines to edit
    debugger.on_incoming_message(
        PROCID,
        message(Method::ResponseBpConditionError, location.clone()),
    );
    assert!(sink.take().is_empty());

    let edited = Breakpoint::new(&project.script, 4).with_condition("x > 0");
    info.edited_breakpoint.replace(Some(edited.clone()));
    debugger.on_incoming_message(PROCID, message(Method::ResponseBpConditionError, location));

    let sent = sink.take();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].params["setBreakpoint"], json!(false));
    assert_eq!(sent[1].params["setBreakpoint"], json!(true));
    assert_eq!(sent[1].params["condition"], json!("x > 0"));
    assert_eq!(debugger.breakpoints().rows(), &[edited]);
}

#[test]
#[serial]
fn test_breakpoints_persisted() {
    let project = Project::new();
    let store = JsonFileStore::new(project.dir.path().join("breakpoints.json"));
    let info = TestInfo::default();
    let mut debugger = DebuggerBuilder::new(TestHooks::new(info.clone()))
        .with_breakpoint_store(store.clone())
        .build();

    debugger.update_breakpoints(|model| model.add(Breakpoint::new(&project.script, 3)));
    let saved: Vec<Breakpoint> = store.load().unwrap();
    assert_eq!(saved, vec![Breakpoint::new(&project.script, 3)]);

    let debugger = DebuggerBuilder::new(TestHooks::new(info))
        .with_breakpoint_store(store)
        .build();
    assert_eq!(debugger.breakpoints().len(), 1);
}

#[test]
#[serial]
fn test_break_command_handler() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    let mut handler = Handler::new(&mut debugger);

    let not_breakable = handler.handle(Command::Add {
        file: project.script.clone(),
        line: 6,
        condition: None,
        temporary: false,
    });
    assert!(matches!(not_breakable, Err(Error::NotBreakable(_, 6))));

    let add = || Command::Add {
        file: project.script.clone(),
        line: 5,
        condition: Some("x == 1".to_string()),
        temporary: true,
    };
    let HandlingResult::New(bp) = handler.handle(add()).unwrap() else {
        panic!("breakpoint expected");
    };
    assert_eq!(bp.condition.as_deref(), Some("x == 1"));
    assert!(bp.temporary);
    assert!(matches!(handler.handle(add()), Err(Error::Duplicate(_))));

    let HandlingResult::Updated(bp) = handler
        .handle(Command::Ignore(project.script.clone(), 5, 3))
        .unwrap()
    else {
        panic!("breakpoint expected");
    };
    assert_eq!(bp.ignore_count, 3);

    assert!(matches!(
        handler.handle(Command::Remove(project.script.clone(), 4)),
        Err(Error::BreakpointNotFound(_))
    ));
    assert!(matches!(
        handler.handle(Command::Clear).unwrap(),
        HandlingResult::Cleared(1)
    ));
    assert!(debugger.breakpoints().is_empty());
}

#[test]
#[serial]
fn test_custom_breakable_lines() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = DebuggerBuilder::new(TestHooks::new(info))
        .with_breakable_lines(AllLines)
        .build();
    assert!(debugger.is_breakable(&project.script, 6));
}
