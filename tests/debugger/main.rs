mod common;

mod breakpoints;
mod session;
mod watchpoints;

use crate::common::{debugger, start_session, stack_message, Project, TestInfo, PROCID};
use cdmdbg::debugger::{DebuggerSettings, DebuggerState};
use cdmdbg::process::FinishStatus;
use cdmdbg::protocol::Method;
use serial_test::serial;

#[test]
#[serial]
fn test_debugger_session_lifecycle() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    assert_eq!(debugger.state(), DebuggerState::Stopped);

    let sink = start_session(&mut debugger, &project.script, DebuggerSettings::default());
    assert_eq!(debugger.state(), DebuggerState::InClient);
    assert_eq!(debugger.procid(), Some(PROCID));

    debugger.on_incoming_message(
        PROCID,
        stack_message(Method::ResponseLine, &project.script_name(), 1),
    );
    assert_eq!(debugger.state(), DebuggerState::InIde);
    assert_eq!(info.line.get(), Some(1));

    debugger.step_over().unwrap();
    assert_eq!(debugger.state(), DebuggerState::InClient);
    assert_eq!(sink.methods(), vec![Method::RequestStepOver]);

    debugger.on_incoming_message(
        PROCID,
        stack_message(Method::ResponseLine, &project.script_name(), 4),
    );
    assert_eq!(debugger.state(), DebuggerState::InIde);
    assert_eq!(info.line.get(), Some(4));

    debugger.on_process_finished(PROCID, FinishStatus::ExitCode(0));
    assert_eq!(debugger.state(), DebuggerState::Stopped);
    assert_eq!(debugger.procid(), None);
    assert_eq!(
        *info.states.borrow(),
        vec![
            DebuggerState::InClient,
            DebuggerState::InIde,
            DebuggerState::InClient,
            DebuggerState::InIde,
            DebuggerState::Stopped
        ]
    );
}

#[test]
#[serial]
fn test_debugger_finish_of_other_process_ignored() {
    let project = Project::new();
    let info = TestInfo::default();
    let mut debugger = debugger(&info);
    start_session(&mut debugger, &project.script, DebuggerSettings::default());

    debugger.on_process_finished(PROCID + 1, FinishStatus::Killed);
    assert_eq!(debugger.state(), DebuggerState::InClient);
    assert_eq!(debugger.procid(), Some(PROCID));
}
