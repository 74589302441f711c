use anyhow::Context;
use cdmdbg::config::Config;
use cdmdbg::log::LOGGER_SWITCHER;
use cdmdbg::process::FinishStatus;
use cdmdbg::ui::console::AppBuilder;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::exit;

#[derive(Debug, Clone, Copy, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
enum Mode {
    Run,
    Profile,
    Debug,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[clap(long, env = "CDM_CONFIG")]
    config: Option<PathBuf>,

    /// Project directory, breakpoints and run parameters are kept there
    #[clap(long)]
    project: Option<PathBuf>,

    /// Run scripts with inherited stdio instead of tunneling it through the IDE
    #[clap(long)]
    no_redirect: bool,

    /// Stay in the console after the script is launched
    #[clap(short, long)]
    interactive: bool,

    /// Launch a script right away
    #[clap(requires = "script")]
    mode: Option<Mode>,

    script: Option<PathBuf>,

    /// Script arguments
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn initial_command(args: &Args) -> anyhow::Result<Option<String>> {
    let (Some(mode), Some(script)) = (args.mode, &args.script) else {
        return Ok(None);
    };
    let script = script.to_string_lossy();
    let words = std::iter::once(script.as_ref()).chain(args.args.iter().map(String::as_str));
    let line = shlex::try_join(words).context("quote script arguments")?;
    Ok(Some(format!("{mode} {line}")))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let logger = env_logger::Logger::from_default_env();
    let filter = logger.filter();
    LOGGER_SWITCHER.switch(logger, filter);

    let config = Config::load(args.config.as_deref()).context("load configuration")?;
    let initial = initial_command(&args)?;

    let builder = AppBuilder::new(config)
        .with_project(args.project.clone())
        .redirected(!args.no_redirect);
    let app = if initial.is_some() && !args.interactive {
        builder.build_batch()?
    } else {
        builder.build()?
    };

    let status = app.run(initial)?;
    if args.interactive || args.mode.is_none() {
        return Ok(());
    }
    match status {
        Some(FinishStatus::ExitCode(code)) => exit(code),
        Some(FinishStatus::Killed) => exit(130),
        Some(FinishStatus::Disconnected) | Some(FinishStatus::FailedToStart) | None => exit(1),
    }
}
