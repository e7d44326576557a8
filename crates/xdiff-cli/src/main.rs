//! Entry point: parse the CLI surface (§6.2), dispatch to the matching
//! subcommand, and translate its exit code into the process's (§7).

mod bootstrap;
mod cli;
mod commands;
mod credentials;
mod error;
mod exit_codes;
mod ignore_paths;
mod input;
mod logging;
mod output;
mod render;

use clap::Parser;

use cli::{Cli, Command};

#[tokio::main]
async fn main() {
    miette::set_panic_hook();
    let cli = Cli::parse();
    logging::init(cli.common.verbose);

    let outcome = match cli.command {
        Command::Xr(args) => commands::xr::run(args, &cli.common).await,
        Command::Comp(args) => commands::comp::run(args, &cli.common).await,
    };

    let exit_code = match outcome {
        Ok(code) => code,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };

    std::process::exit(exit_code);
}
