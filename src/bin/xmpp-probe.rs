//! CLI entry point. Argument validation errors print to stderr and exit
//! non-zero without constructing the engine (spec.md §7); every other
//! outcome -- including every probe's own `success = false` -- exits 0.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use xmpp_probe::cli::Cli;
use xmpp_probe::dns::SystemResolver;
use xmpp_probe::output::render;
use xmpp_probe::scheduler;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let resolver = match SystemResolver::new() {
        Ok(resolver) => Arc::new(resolver),
        Err(e) => {
            eprintln!("xmpp-probe: {e}");
            return ExitCode::FAILURE;
        }
    };

    let kernel = cli.kernel();
    let config = cli.engine_config();

    let run_result = match kernel {
        None => scheduler::run_dns(resolver, config).await,
        Some(k) => scheduler::run(k, resolver, config).await,
    };

    match run_result {
        Ok((data, tags)) => {
            println!("{}", render(cli.format, kernel, &data, &tags));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("xmpp-probe: {e}");
            ExitCode::FAILURE
        }
    }
}
