use crate::ui::command::parser;

pub const HELP: &str = r#"
Available commands:

r, run <script> [args]                      -- run a script, without arguments the remembered ones are used
profile <script> [args]                     -- run a script under the profiler
d, debug <script> [args]                    -- start a debug session
kill <id>|all                               -- kill a launched process or all of them
ps                                          -- show launched processes
i, input <text>                             -- send a line to the process waiting for input
step, stepinto                              -- step into
next, stepover                              -- step over
finish, stepout                             -- step out of the current frame
c, continue                                 -- continue execution
until                                       -- continue until a line greater than the current one is reached
stop [exit code]                            -- terminate the debugged script
b, break <file:line> [if <condition>]       -- manage breakpoints
tbreak <file:line> [if <condition>]         -- add a temporary breakpoint
w, watch [created|changed] <expression>     -- manage watch expressions
thread info|switch <id>                     -- show threads of the debugged script or switch to one
locals|globals [frame]                      -- show variables of a frame
var <name> [frame]                          -- show a variable
p, eval <expression>                        -- evaluate an expression in the current frame
exec <statement>                            -- execute a statement in the current frame
trace on|off                                -- enable or disable call tracing
h, help <>|<command>                        -- show help
q, quit                                     -- kill all processes and exit
"#;

pub const HELP_BREAK: &str = "\
\x1b[32;1mbreak\x1b[0m
Manage breakpoints. Breakpoints persist between sessions and are sent to every debugged script.

Available subcomands:
break <file:line> [if <condition>] - add a breakpoint, the line must contain a statement
break remove|r <file:line> - remove a breakpoint
break enable|disable <file:line> - enable or disable a breakpoint
break ignore <file:line> <count> - skip a breakpoint <count> times
break clear - remove all breakpoints
break info - show all breakpoints

Examples of usage:
break main.py:12 if len(items) > 3
tbreak utils.py:40
";

pub const HELP_WATCH: &str = "\
\x1b[32;1mwatch\x1b[0m
Manage watch expressions.

Available subcomands:
watch <expression> - stop when the expression is true
watch created <variable> - stop when the variable is created
watch changed <variable> - stop when the variable value changes
watch remove|r <expression> - remove a watch expression
watch enable|disable <expression> - enable or disable a watch expression
watch ignore <expression> <count> - skip a watch expression <count> times
watch info - show all watch expressions
";

pub const HELP_RUN: &str = "\
\x1b[32;1mrun\x1b[0m
Run a script. Arguments are split with shell quoting rules. Arguments given on the command line
are remembered and used by later launches of the same script.

Examples of usage:
run main.py
run main.py --verbose 'a b'
";

pub fn help_for_command(command: Option<&str>) -> &str {
    match command {
        Some(parser::BREAK_COMMAND)
        | Some(parser::BREAK_COMMAND_SHORT)
        | Some(parser::TBREAK_COMMAND) => HELP_BREAK,
        Some(parser::WATCH_COMMAND) | Some(parser::WATCH_COMMAND_SHORT) => HELP_WATCH,
        Some(parser::RUN_COMMAND)
        | Some(parser::RUN_COMMAND_SHORT)
        | Some(parser::PROFILE_COMMAND)
        | Some(parser::DEBUG_COMMAND) => HELP_RUN,
        _ => HELP,
    }
}
