use crate::common::{debugger, message, start_session, Project, TestInfo, PROCID};
use cdmdbg::debugger::watchpoint::{WatchSpecial, Watchpoint};
use cdmdbg::debugger::DebuggerSettings;
use cdmdbg::protocol::Method;
use cdmdbg::ui::command::watch::{Command, Handler, HandlingResult};
use cdmdbg::Error;
use serde_json::json;
use serial_test::serial;

#[test]
#[serial]
fn test_watchpoints_pushed_on_startup() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    debugger.update_watchpoints(|model| {
        model.add(Watchpoint::new("x").with_special(WatchSpecial::Changed));
    });
    let sink = start_session(&mut debugger, &project.script, DebuggerSettings::default());

    debugger.on_incoming_message(PROCID, message(Method::DebugStartup, json!({})));

    let sent = sink.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, Method::RequestWatch);
    assert_eq!(sent[0].params["condition"], json!("x"));
    assert_eq!(sent[0].params["special"], json!("??changed??"));
    assert_eq!(sent[0].params["setWatch"], json!(true));
}

#[test]
#[serial]
fn test_watchpoint_changes_mirrored() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    let sink = start_session(&mut debugger, &project.script, DebuggerSettings::default());

    debugger.update_watchpoints(|model| model.add(Watchpoint::new("x > 10")));
    let sent = sink.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].params["special"], json!(""));

    debugger.update_watchpoints(|model| model.set_enabled_by_index(0, false));
    let methods = sink.methods();
    assert_eq!(
        methods,
        vec![
            Method::RequestWatch,
            Method::RequestWatch,
            Method::RequestWatchEnable
        ]
    );
    let sent = sink.take();
    assert_eq!(sent[0].params["setWatch"], json!(false));
    assert_eq!(sent[1].params["setWatch"], json!(true));
    assert_eq!(sent[2].params["enable"], json!(false));
}

#[test]
#[serial]
fn test_clear_watch_not_echoed() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    let sink = start_session(&mut debugger, &project.script, DebuggerSettings::default());
    debugger.update_watchpoints(|model| model.add(Watchpoint::new("y")));
    sink.take();

    debugger.on_incoming_message(PROCID, message(Method::ClearWatch, json!({"condition": "y"})));

    assert!(debugger.watchpoints().is_empty());
    assert!(sink.take().is_empty());
}

#[test]
#[serial]
fn test_watchpoint_condition_error() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    debugger.update_watchpoints(|model| model.add(Watchpoint::new("x ==")));
    let sink = start_session(&mut debugger, &project.script, DebuggerSettings::default());

    let edited = Watchpoint::new("x == 2");
    info.edited_watchpoint.replace(Some(edited.clone()));
    debugger.on_incoming_message(
        PROCID,
        message(
            Method::ResponseWatchConditionError,
            json!({"condition": "x =="}),
        ),
    );

    let sent = sink.take();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].params["condition"], json!("x =="));
    assert_eq!(sent[0].params["setWatch"], json!(false));
    assert_eq!(sent[1].params["condition"], json!("x == 2"));
    assert_eq!(sent[1].params["setWatch"], json!(true));
    assert_eq!(debugger.watchpoints().rows(), &[edited]);
}

#[test]
#[serial]
fn test_watch_command_handler() {
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    let mut handler = Handler::new(&mut debugger);

    let HandlingResult::New(wp) = handler
        .handle(Command::Add("counter".to_string(), WatchSpecial::Created))
        .unwrap()
    else {
        panic!("watchpoint expected");
    };
    assert_eq!(wp.special, WatchSpecial::Created);
    assert!(matches!(
        handler.handle(Command::Add("counter".to_string(), WatchSpecial::Created)),
        Err(Error::Duplicate(_))
    ));

    // same expression with another trigger is a different watchpoint
    handler
        .handle(Command::Add("counter".to_string(), WatchSpecial::Changed))
        .unwrap();

    let HandlingResult::Updated(wp) = handler
        .handle(Command::Enable("counter".to_string(), false))
        .unwrap()
    else {
        panic!("watchpoint expected");
    };
    assert!(!wp.enabled);

    assert!(matches!(
        handler.handle(Command::Remove("missing".to_string())),
        Err(Error::WatchpointNotFound(_))
    ));
    let HandlingResult::Dump(all) = handler.handle(Command::Info).unwrap() else {
        panic!("dump expected");
    };
    assert_eq!(all.len(), 2);
    assert!(!all[0].enabled);
    assert!(all[1].enabled);
}
