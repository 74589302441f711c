use crate::ui::command::parser::{
    BREAK_COMMAND, BREAK_COMMAND_SHORT, CLEAR_SUBCOMMAND, CONTINUE_COMMAND, CONTINUE_COMMAND_SHORT,
    DEBUG_COMMAND, DEBUG_COMMAND_SHORT, DISABLE_SUBCOMMAND, ENABLE_SUBCOMMAND, EVAL_COMMAND,
    EVAL_COMMAND_SHORT, EXEC_COMMAND, GLOBALS_COMMAND, HELP_COMMAND, HELP_COMMAND_SHORT,
    IGNORE_SUBCOMMAND, INFO_SUBCOMMAND, INPUT_COMMAND, INPUT_COMMAND_SHORT, KILL_ALL_SUBCOMMAND,
    KILL_COMMAND, LOCALS_COMMAND, PROCESSES_COMMAND, PROFILE_COMMAND, REMOVE_SUBCOMMAND,
    RUN_COMMAND, RUN_COMMAND_SHORT, STEP_INTO_COMMAND, STEP_INTO_COMMAND_SHORT, STEP_OUT_COMMAND,
    STEP_OUT_COMMAND_SHORT, STEP_OVER_COMMAND, STEP_OVER_COMMAND_SHORT, STOP_COMMAND,
    TBREAK_COMMAND, THREAD_COMMAND, THREAD_COMMAND_SWITCH_SUBCOMMAND, TRACE_COMMAND,
    UNTIL_COMMAND, VAR_COMMAND, WATCH_CHANGED_SUBCOMMAND, WATCH_COMMAND, WATCH_COMMAND_SHORT,
    WATCH_CREATED_SUBCOMMAND,
};
use crossterm::style::{Color, Stylize};
use itertools::Itertools;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::HistoryHinter;
use rustyline::history::MemHistory;
use rustyline::{CompletionType, Config, Context, Editor};
use rustyline_derive::{Helper, Hinter, Validator};
use std::borrow::Cow;
use std::borrow::Cow::{Borrowed, Owned};
use std::collections::HashMap;
use std::fs;

struct CommandHint {
    short: Option<String>,
    long: String,
    subcommands: Vec<String>,
    /// Complete file system paths after the command.
    paths: bool,
}

impl CommandHint {
    fn display_with_short(&self) -> String {
        match self.short {
            Some(ref short) if self.long.starts_with(short) => format!(
                "{}{}",
                short.clone().bold().underlined(),
                &self.long[short.len()..]
            ),
            Some(ref short) => format!("{}|{}", &self.long, short.clone().bold().underlined()),
            None => self.long.clone(),
        }
    }

    fn with_subcommands(mut self, subcommands: &[&str]) -> Self {
        self.subcommands = subcommands.iter().map(ToString::to_string).collect();
        self
    }

    fn with_paths(mut self) -> Self {
        self.paths = true;
        self
    }
}

impl From<&str> for CommandHint {
    fn from(value: &str) -> Self {
        CommandHint {
            short: None,
            long: value.to_string(),
            subcommands: vec![],
            paths: false,
        }
    }
}

impl From<(&str, &str)> for CommandHint {
    fn from((short, long): (&str, &str)) -> Self {
        CommandHint {
            short: Some(short.to_string()),
            long: long.to_string(),
            subcommands: vec![],
            paths: false,
        }
    }
}

pub struct CommandCompleter {
    commands: Vec<CommandHint>,
    subcommand_hints: HashMap<String, Vec<String>>,
    path_commands: Vec<String>,
}

impl CommandCompleter {
    fn new(commands: impl IntoIterator<Item = CommandHint>) -> Self {
        let commands: Vec<CommandHint> = commands.into_iter().collect();
        let names = |cmd: &CommandHint| {
            let mut names = vec![cmd.long.clone()];
            names.extend(cmd.short.clone());
            names
        };
        let subcommand_hints = commands
            .iter()
            .filter(|cmd| !cmd.subcommands.is_empty())
            .flat_map(|cmd| {
                names(cmd)
                    .into_iter()
                    .map(|name| (name, cmd.subcommands.clone()))
            })
            .collect::<HashMap<String, Vec<String>>>();
        let path_commands = commands
            .iter()
            .filter(|cmd| cmd.paths)
            .flat_map(names)
            .collect();

        Self {
            commands,
            subcommand_hints,
            path_commands,
        }
    }
}

/// Complete the last path component of `word` with directory entries.
fn complete_path(word: &str) -> Vec<Pair> {
    let (dir, prefix) = match word.rfind('/') {
        Some(idx) => (&word[..=idx], &word[idx + 1..]),
        None => ("", word),
    };
    let Ok(entries) = fs::read_dir(if dir.is_empty() { "." } else { dir }) else {
        return vec![];
    };

    entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(prefix) || (name.starts_with('.') && !prefix.starts_with('.')) {
                return None;
            }
            let suffix = if entry.path().is_dir() { "/" } else { "" };
            Some(Pair {
                display: format!("{name}{suffix}"),
                replacement: format!("{dir}{name}{suffix}"),
            })
        })
        .sorted_by(|a, b| a.display.cmp(&b.display))
        .collect()
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let line = &line[..pos];

        if let Some((cmd, rest)) = line.split_once(' ') {
            let rest = rest.trim_start();
            let word_start = pos - rest.len();

            if let Some(subcommands) = self.subcommand_hints.get(cmd) {
                if !rest.contains(' ') {
                    let hints = subcommands
                        .iter()
                        .filter(|subcmd| subcmd.starts_with(rest))
                        .map(|subcmd| Pair {
                            display: subcmd.to_string(),
                            replacement: subcmd.to_string(),
                        })
                        .collect_vec();
                    if !hints.is_empty() {
                        return Ok((word_start, hints));
                    }
                }
            }

            if self.path_commands.iter().any(|c| c == cmd) {
                let word = rest.rsplit(' ').next().unwrap_or_default();
                return Ok((pos - word.len(), complete_path(word)));
            }
            return Ok((pos, vec![]));
        }

        let pairs = self
            .commands
            .iter()
            .filter(|&cmd| cmd.long.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.display_with_short(),
                replacement: cmd.long.clone(),
            })
            .collect();
        Ok((0, pairs))
    }
}

#[derive(Helper, Hinter, Validator)]
pub struct RLHelper {
    completer: CommandCompleter,
    #[rustyline(Hinter)]
    hinter: HistoryHinter,
    colored_prompt: String,
}

impl Completer for RLHelper {
    type Candidate = <CommandCompleter as Completer>::Candidate;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        self.completer.complete(line, pos, ctx)
    }
}

impl Highlighter for RLHelper {
    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        default: bool,
    ) -> Cow<'b, str> {
        if default {
            Borrowed(&self.colored_prompt)
        } else {
            Borrowed(prompt)
        }
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Owned(format!("{}", hint.with(Color::Grey)))
    }
}

pub fn create_editor(promt: &str) -> anyhow::Result<Editor<RLHelper, MemHistory>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .build();

    let break_subcommands = [
        REMOVE_SUBCOMMAND,
        ENABLE_SUBCOMMAND,
        DISABLE_SUBCOMMAND,
        IGNORE_SUBCOMMAND,
        CLEAR_SUBCOMMAND,
        INFO_SUBCOMMAND,
    ];
    let commands = [
        CommandHint::from((RUN_COMMAND_SHORT, RUN_COMMAND)).with_paths(),
        CommandHint::from(PROFILE_COMMAND).with_paths(),
        CommandHint::from((DEBUG_COMMAND_SHORT, DEBUG_COMMAND)).with_paths(),
        CommandHint::from(KILL_COMMAND).with_subcommands(&[KILL_ALL_SUBCOMMAND]),
        PROCESSES_COMMAND.into(),
        (INPUT_COMMAND_SHORT, INPUT_COMMAND).into(),
        (STEP_INTO_COMMAND_SHORT, STEP_INTO_COMMAND).into(),
        (STEP_OVER_COMMAND_SHORT, STEP_OVER_COMMAND).into(),
        (STEP_OUT_COMMAND_SHORT, STEP_OUT_COMMAND).into(),
        (CONTINUE_COMMAND_SHORT, CONTINUE_COMMAND).into(),
        UNTIL_COMMAND.into(),
        STOP_COMMAND.into(),
        CommandHint::from((BREAK_COMMAND_SHORT, BREAK_COMMAND))
            .with_subcommands(&break_subcommands)
            .with_paths(),
        CommandHint::from(TBREAK_COMMAND).with_paths(),
        CommandHint::from((WATCH_COMMAND_SHORT, WATCH_COMMAND)).with_subcommands(&[
            WATCH_CREATED_SUBCOMMAND,
            WATCH_CHANGED_SUBCOMMAND,
            REMOVE_SUBCOMMAND,
            ENABLE_SUBCOMMAND,
            DISABLE_SUBCOMMAND,
            IGNORE_SUBCOMMAND,
            INFO_SUBCOMMAND,
        ]),
        CommandHint::from(THREAD_COMMAND)
            .with_subcommands(&[INFO_SUBCOMMAND, THREAD_COMMAND_SWITCH_SUBCOMMAND]),
        LOCALS_COMMAND.into(),
        GLOBALS_COMMAND.into(),
        VAR_COMMAND.into(),
        (EVAL_COMMAND_SHORT, EVAL_COMMAND).into(),
        EXEC_COMMAND.into(),
        CommandHint::from(TRACE_COMMAND).with_subcommands(&["on", "off"]),
        (HELP_COMMAND_SHORT, HELP_COMMAND).into(),
        ("q", "quit").into(),
    ];

    let h = RLHelper {
        completer: CommandCompleter::new(commands),
        hinter: HistoryHinter {},
        colored_prompt: format!("{}", promt.with(Color::DarkGreen)),
    };

    let mut editor = Editor::with_history(config, MemHistory::new())?;
    editor.set_helper(Some(h));
    Ok(editor)
}
