//! Run client: executes a script on behalf of the IDE with stdio tunneled through a socket.

use cdmdbg::client::{self, ClientOptions};
use cdmdbg::log::LOGGER_SWITCHER;
use clap::Parser;
use log::error;
use std::process::exit;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IDE host
    #[clap(long, default_value = "127.0.0.1")]
    host: String,

    /// IDE port
    #[clap(long)]
    port: u16,

    /// Process identifier assigned by the IDE
    #[clap(long)]
    procid: u64,

    /// Program to run and its arguments
    #[clap(last = true, required = true)]
    argv: Vec<String>,
}

fn main() {
    let args = Args::parse();

    let logger = env_logger::Logger::from_default_env();
    let filter = logger.filter();
    LOGGER_SWITCHER.switch(logger, filter);

    let options = ClientOptions {
        host: args.host,
        port: args.port,
        procid: args.procid,
        argv: args.argv,
    };
    match client::run(options) {
        Ok(code) => exit(code),
        Err(e) => {
            error!(target: "client", "{e:#}");
            exit(1);
        }
    }
}
