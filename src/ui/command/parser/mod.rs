use super::{r#break, watch, Command, CommandError, CommandResult, Launch};
use crate::debugger::watchpoint::WatchSpecial;
use crate::protocol::params::Scope;
use std::path::PathBuf;
use std::str::FromStr;

pub const RUN_COMMAND: &str = "run";
pub const RUN_COMMAND_SHORT: &str = "r";
pub const PROFILE_COMMAND: &str = "profile";
pub const DEBUG_COMMAND: &str = "debug";
pub const DEBUG_COMMAND_SHORT: &str = "d";
pub const KILL_COMMAND: &str = "kill";
pub const KILL_ALL_SUBCOMMAND: &str = "all";
pub const PROCESSES_COMMAND: &str = "ps";
pub const INPUT_COMMAND: &str = "input";
pub const INPUT_COMMAND_SHORT: &str = "i";
pub const STEP_INTO_COMMAND: &str = "stepinto";
pub const STEP_INTO_COMMAND_SHORT: &str = "step";
pub const STEP_OUT_COMMAND: &str = "stepout";
pub const STEP_OUT_COMMAND_SHORT: &str = "finish";
pub const STEP_OVER_COMMAND: &str = "stepover";
pub const STEP_OVER_COMMAND_SHORT: &str = "next";
pub const CONTINUE_COMMAND: &str = "continue";
pub const CONTINUE_COMMAND_SHORT: &str = "c";
pub const UNTIL_COMMAND: &str = "until";
pub const STOP_COMMAND: &str = "stop";
pub const BREAK_COMMAND: &str = "break";
pub const BREAK_COMMAND_SHORT: &str = "b";
pub const TBREAK_COMMAND: &str = "tbreak";
pub const BREAK_CONDITION_KEY: &str = "if";
pub const WATCH_COMMAND: &str = "watch";
pub const WATCH_COMMAND_SHORT: &str = "w";
pub const WATCH_CREATED_SUBCOMMAND: &str = "created";
pub const WATCH_CHANGED_SUBCOMMAND: &str = "changed";
pub const REMOVE_SUBCOMMAND: &str = "remove";
pub const REMOVE_SUBCOMMAND_SHORT: &str = "r";
pub const ENABLE_SUBCOMMAND: &str = "enable";
pub const DISABLE_SUBCOMMAND: &str = "disable";
pub const IGNORE_SUBCOMMAND: &str = "ignore";
pub const CLEAR_SUBCOMMAND: &str = "clear";
pub const INFO_SUBCOMMAND: &str = "info";
pub const THREAD_COMMAND: &str = "thread";
pub const THREAD_COMMAND_SWITCH_SUBCOMMAND: &str = "switch";
pub const LOCALS_COMMAND: &str = "locals";
pub const GLOBALS_COMMAND: &str = "globals";
pub const VAR_COMMAND: &str = "var";
pub const EVAL_COMMAND: &str = "eval";
pub const EVAL_COMMAND_SHORT: &str = "p";
pub const EXEC_COMMAND: &str = "exec";
pub const TRACE_COMMAND: &str = "trace";
pub const HELP_COMMAND: &str = "help";
pub const HELP_COMMAND_SHORT: &str = "h";

fn malformed(msg: impl Into<String>) -> CommandError {
    CommandError::Parsing(msg.into())
}

/// Split off the first word of an input.
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    }
}

fn number<T: FromStr>(s: &str, what: &str) -> CommandResult<T> {
    s.trim()
        .parse()
        .map_err(|_| malformed(format!("invalid {what}: `{s}`")))
}

fn optional_number<T: FromStr>(s: &str, what: &str) -> CommandResult<Option<T>> {
    if s.is_empty() {
        return Ok(None);
    }
    number(s, what).map(Some)
}

fn not_empty<'a>(s: &'a str, what: &str) -> CommandResult<&'a str> {
    if s.is_empty() {
        return Err(malformed(format!("{what} expected")));
    }
    Ok(s)
}

fn launch(args: &str) -> CommandResult<Launch> {
    let (script, arguments) = split_word(args);
    Ok(Launch {
        script: PathBuf::from(not_empty(script, "script path")?),
        arguments: (!arguments.is_empty()).then(|| arguments.to_string()),
    })
}

/// Parse `file:line`.
fn location(s: &str) -> CommandResult<(PathBuf, u32)> {
    let (file, line) = s
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| malformed(format!("`{s}` is not a file:line location")))?;
    Ok((PathBuf::from(not_empty(file, "file")?), number(line, "line")?))
}

fn breakpoint(args: &str, temporary: bool) -> CommandResult<r#break::Command> {
    let (sub, rest) = split_word(args);
    let cmd = match sub {
        "" | INFO_SUBCOMMAND if !temporary => r#break::Command::Info,
        CLEAR_SUBCOMMAND if !temporary => r#break::Command::Clear,
        REMOVE_SUBCOMMAND | REMOVE_SUBCOMMAND_SHORT if !temporary => {
            let (file, line) = location(rest)?;
            r#break::Command::Remove(file, line)
        }
        ENABLE_SUBCOMMAND | DISABLE_SUBCOMMAND if !temporary => {
            let (file, line) = location(rest)?;
            r#break::Command::Enable(file, line, sub == ENABLE_SUBCOMMAND)
        }
        IGNORE_SUBCOMMAND if !temporary => {
            let (loc, count) = split_word(rest);
            let (file, line) = location(loc)?;
            r#break::Command::Ignore(file, line, number(count, "ignore count")?)
        }
        _ => {
            let (file, line) = location(sub)?;
            let condition = match split_word(rest) {
                ("", _) => None,
                (BREAK_CONDITION_KEY, cond) => Some(not_empty(cond, "condition")?.to_string()),
                (other, _) => return Err(malformed(format!("unexpected `{other}`"))),
            };
            r#break::Command::Add {
                file,
                line,
                condition,
                temporary,
            }
        }
    };
    Ok(cmd)
}

fn watchpoint(args: &str) -> CommandResult<watch::Command> {
    let (sub, rest) = split_word(args);
    let cmd = match sub {
        "" | INFO_SUBCOMMAND if rest.is_empty() => watch::Command::Info,
        REMOVE_SUBCOMMAND | REMOVE_SUBCOMMAND_SHORT => {
            watch::Command::Remove(not_empty(rest, "expression")?.to_string())
        }
        ENABLE_SUBCOMMAND | DISABLE_SUBCOMMAND => watch::Command::Enable(
            not_empty(rest, "expression")?.to_string(),
            sub == ENABLE_SUBCOMMAND,
        ),
        IGNORE_SUBCOMMAND => {
            let (expr, count) = rest
                .rsplit_once(char::is_whitespace)
                .ok_or_else(|| malformed("expression and ignore count expected"))?;
            watch::Command::Ignore(expr.trim().to_string(), number(count, "ignore count")?)
        }
        WATCH_CREATED_SUBCOMMAND => watch::Command::Add(
            not_empty(rest, "expression")?.to_string(),
            WatchSpecial::Created,
        ),
        WATCH_CHANGED_SUBCOMMAND => watch::Command::Add(
            not_empty(rest, "expression")?.to_string(),
            WatchSpecial::Changed,
        ),
        _ => watch::Command::Add(args.trim().to_string(), WatchSpecial::None),
    };
    Ok(cmd)
}

impl Command {
    /// Parse input string into command.
    pub fn parse(input: &str) -> CommandResult<Command> {
        let (cmd, args) = split_word(input);
        let command = match cmd {
            RUN_COMMAND | RUN_COMMAND_SHORT => Command::Run(launch(args)?),
            PROFILE_COMMAND => Command::Profile(launch(args)?),
            DEBUG_COMMAND | DEBUG_COMMAND_SHORT => Command::Debug(launch(args)?),
            KILL_COMMAND => match args {
                KILL_ALL_SUBCOMMAND => Command::Kill(None),
                _ => Command::Kill(Some(number(not_empty(args, "process id")?, "process id")?)),
            },
            PROCESSES_COMMAND => Command::Processes,
            INPUT_COMMAND | INPUT_COMMAND_SHORT => Command::Input(args.to_string()),
            STEP_INTO_COMMAND | STEP_INTO_COMMAND_SHORT => Command::StepInto,
            STEP_OVER_COMMAND | STEP_OVER_COMMAND_SHORT => Command::StepOver,
            STEP_OUT_COMMAND | STEP_OUT_COMMAND_SHORT => Command::StepOut,
            CONTINUE_COMMAND | CONTINUE_COMMAND_SHORT => Command::Continue { special: false },
            UNTIL_COMMAND => Command::Continue { special: true },
            STOP_COMMAND => Command::Stop(optional_number(args, "exit code")?),
            BREAK_COMMAND | BREAK_COMMAND_SHORT => Command::Breakpoint(breakpoint(args, false)?),
            TBREAK_COMMAND => Command::Breakpoint(breakpoint(args, true)?),
            WATCH_COMMAND | WATCH_COMMAND_SHORT => Command::Watchpoint(watchpoint(args)?),
            THREAD_COMMAND => match split_word(args) {
                ("" | INFO_SUBCOMMAND, "") => Command::ThreadList,
                (THREAD_COMMAND_SWITCH_SUBCOMMAND, id) => {
                    Command::ThreadSwitch(number(not_empty(id, "thread id")?, "thread id")?)
                }
                (other, _) => return Err(malformed(format!("unknown subcommand `{other}`"))),
            },
            LOCALS_COMMAND | GLOBALS_COMMAND => Command::PrintVariables {
                scope: if cmd == LOCALS_COMMAND {
                    Scope::Local
                } else {
                    Scope::Global
                },
                frame: optional_number(args, "frame number")?.unwrap_or_default(),
            },
            VAR_COMMAND => {
                let (name, frame) = split_word(args);
                Command::PrintVariable {
                    name: not_empty(name, "variable name")?.to_string(),
                    frame: optional_number(frame, "frame number")?.unwrap_or_default(),
                }
            }
            EVAL_COMMAND | EVAL_COMMAND_SHORT => {
                Command::Eval(not_empty(args, "expression")?.to_string())
            }
            EXEC_COMMAND => Command::Exec(not_empty(args, "statement")?.to_string()),
            TRACE_COMMAND => match args {
                "on" => Command::CallTrace(true),
                "off" => Command::CallTrace(false),
                _ => return Err(malformed("`on` or `off` expected")),
            },
            HELP_COMMAND | HELP_COMMAND_SHORT => Command::Help {
                command: (!args.is_empty()).then(|| args.to_string()),
                reason: None,
            },
            "" => return Err(malformed("empty command")),
            other => return Err(malformed(format!("unknown command `{other}`"))),
        };
        Ok(command)
    }
}

#[test]
fn test_location_parser() {
    struct TestCase {
        string: &'static str,
        result: Result<(&'static str, u32), ()>,
    }
    let cases = vec![
        TestCase {
            string: "main.py:12",
            result: Ok(("main.py", 12)),
        },
        TestCase {
            string: " /proj/pkg/mod.py:1 ",
            result: Ok(("/proj/pkg/mod.py", 1)),
        },
        TestCase {
            string: "main.py",
            result: Err(()),
        },
        TestCase {
            string: "main.py:x",
            result: Err(()),
        },
        TestCase {
            string: ":12",
            result: Err(()),
        },
    ];

    for tc in cases {
        let expr = location(tc.string);
        match tc.result {
            Ok((file, line)) => assert_eq!(expr.unwrap(), (PathBuf::from(file), line)),
            Err(_) => assert!(expr.is_err(), "{} must fail", tc.string),
        }
    }
}

#[test]
fn test_parser() {
    struct TestCase {
        inputs: Vec<&'static str>,
        command_matcher: fn(result: Result<Command, CommandError>),
    }
    let cases = vec![
        TestCase {
            inputs: vec!["run main.py", " r  main.py "],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::Run(Launch {
                        script: PathBuf::from("main.py"),
                        arguments: None
                    })
                );
            },
        },
        TestCase {
            inputs: vec!["debug main.py -v 'a b'", "d main.py   -v 'a b'"],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::Debug(Launch {
                        script: PathBuf::from("main.py"),
                        arguments: Some("-v 'a b'".to_string())
                    })
                );
            },
        },
        TestCase {
            inputs: vec!["profile", "run"],
            command_matcher: |result| {
                assert!(matches!(result, Err(CommandError::Parsing(_))));
            },
        },
        TestCase {
            inputs: vec!["kill 3"],
            command_matcher: |result| {
                assert_eq!(result.unwrap(), Command::Kill(Some(3)));
            },
        },
        TestCase {
            inputs: vec!["kill all"],
            command_matcher: |result| {
                assert_eq!(result.unwrap(), Command::Kill(None));
            },
        },
        TestCase {
            inputs: vec!["kill", "kill x"],
            command_matcher: |result| {
                assert!(result.is_err());
            },
        },
        TestCase {
            inputs: vec!["input 42", "i 42"],
            command_matcher: |result| {
                assert_eq!(result.unwrap(), Command::Input("42".to_string()));
            },
        },
        TestCase {
            inputs: vec!["next", "stepover"],
            command_matcher: |result| {
                assert_eq!(result.unwrap(), Command::StepOver);
            },
        },
        TestCase {
            inputs: vec!["finish", "stepout"],
            command_matcher: |result| {
                assert_eq!(result.unwrap(), Command::StepOut);
            },
        },
        TestCase {
            inputs: vec!["c", "continue"],
            command_matcher: |result| {
                assert_eq!(result.unwrap(), Command::Continue { special: false });
            },
        },
        TestCase {
            inputs: vec!["until"],
            command_matcher: |result| {
                assert_eq!(result.unwrap(), Command::Continue { special: true });
            },
        },
        TestCase {
            inputs: vec!["stop 3"],
            command_matcher: |result| {
                assert_eq!(result.unwrap(), Command::Stop(Some(3)));
            },
        },
        TestCase {
            inputs: vec!["b main.py:5", "break main.py:5"],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::Breakpoint(r#break::Command::Add {
                        file: PathBuf::from("main.py"),
                        line: 5,
                        condition: None,
                        temporary: false,
                    })
                );
            },
        },
        TestCase {
            inputs: vec!["tbreak main.py:5 if x > 1 and y"],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::Breakpoint(r#break::Command::Add {
                        file: PathBuf::from("main.py"),
                        line: 5,
                        condition: Some("x > 1 and y".to_string()),
                        temporary: true,
                    })
                );
            },
        },
        TestCase {
            inputs: vec!["break main.py:5 when x", "b main.py:5 if", "tbreak info"],
            command_matcher: |result| {
                assert!(result.is_err());
            },
        },
        TestCase {
            inputs: vec!["b", "break info"],
            command_matcher: |result| {
                assert_eq!(result.unwrap(), Command::Breakpoint(r#break::Command::Info));
            },
        },
        TestCase {
            inputs: vec!["b r main.py:5", "break remove main.py:5"],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::Breakpoint(r#break::Command::Remove(PathBuf::from("main.py"), 5))
                );
            },
        },
        TestCase {
            inputs: vec!["break disable main.py:5"],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::Breakpoint(r#break::Command::Enable(
                        PathBuf::from("main.py"),
                        5,
                        false
                    ))
                );
            },
        },
        TestCase {
            inputs: vec!["break ignore main.py:5 3"],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::Breakpoint(r#break::Command::Ignore(PathBuf::from("main.py"), 5, 3))
                );
            },
        },
        TestCase {
            inputs: vec!["watch a == 1", "w  a == 1"],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::Watchpoint(watch::Command::Add(
                        "a == 1".to_string(),
                        WatchSpecial::None
                    ))
                );
            },
        },
        TestCase {
            inputs: vec!["watch changed counter"],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::Watchpoint(watch::Command::Add(
                        "counter".to_string(),
                        WatchSpecial::Changed
                    ))
                );
            },
        },
        TestCase {
            inputs: vec!["watch ignore a == 1 2"],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::Watchpoint(watch::Command::Ignore("a == 1".to_string(), 2))
                );
            },
        },
        TestCase {
            inputs: vec!["watch", "w info"],
            command_matcher: |result| {
                assert_eq!(result.unwrap(), Command::Watchpoint(watch::Command::Info));
            },
        },
        TestCase {
            inputs: vec!["thread", "thread info"],
            command_matcher: |result| {
                assert_eq!(result.unwrap(), Command::ThreadList);
            },
        },
        TestCase {
            inputs: vec!["thread switch 140000"],
            command_matcher: |result| {
                assert_eq!(result.unwrap(), Command::ThreadSwitch(140000));
            },
        },
        TestCase {
            inputs: vec!["globals 2"],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::PrintVariables {
                        scope: Scope::Global,
                        frame: 2
                    }
                );
            },
        },
        TestCase {
            inputs: vec!["locals"],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::PrintVariables {
                        scope: Scope::Local,
                        frame: 0
                    }
                );
            },
        },
        TestCase {
            inputs: vec!["var items 1"],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::PrintVariable {
                        name: "items".to_string(),
                        frame: 1
                    }
                );
            },
        },
        TestCase {
            inputs: vec!["p len(items) + 1", "eval len(items) + 1"],
            command_matcher: |result| {
                assert_eq!(result.unwrap(), Command::Eval("len(items) + 1".to_string()));
            },
        },
        TestCase {
            inputs: vec!["trace on"],
            command_matcher: |result| {
                assert_eq!(result.unwrap(), Command::CallTrace(true));
            },
        },
        TestCase {
            inputs: vec!["trace", "trace maybe"],
            command_matcher: |result| {
                assert!(result.is_err());
            },
        },
        TestCase {
            inputs: vec!["help break", "h break"],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::Help {
                        command: Some("break".to_string()),
                        reason: None
                    }
                );
            },
        },
        TestCase {
            inputs: vec!["", "frobnicate"],
            command_matcher: |result| {
                assert!(matches!(result, Err(CommandError::Parsing(_))));
            },
        },
    ];

    for case in cases {
        for input in case.inputs {
            (case.command_matcher)(Command::parse(input));
        }
    }
}
