use clap::Parser;
use env_logger::Env;
use log::error;

use imscan::cli::SubCommandExtend;
use imscan::config::{Opts, SubCommand};

#[tokio::main]
async fn main() {
    let opts = Opts::parse();

    let level = if opts.verbose { "info,imscan=debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let result = match &opts.subcmd {
        SubCommand::Scan(config) => config.run(&opts).await,
        SubCommand::Server(config) => config.run(&opts).await,
    };

    if let Err(e) = result {
        error!("{e:#}");
        std::process::exit(1);
    }
}
