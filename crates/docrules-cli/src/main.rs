mod cli;
mod commands;
mod config;
mod observability;
mod output;
mod suite;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            print_error(&format!("{e:#}"));
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    let cfg = config::load(cli.config.as_deref())?;
    let debounce_ms = match &cli.command {
        Commands::Watch(args) => args.debounce_ms,
        _ => None,
    };
    let settings = config::resolve(&cli, cfg, debounce_ms);
    observability::init_tracing_with_level(&settings.log_level);

    match cli.command {
        Commands::Check(args) => {
            commands::check::check(&args.policy, settings.format)?;
            Ok(0)
        }
        Commands::Eval(args) => commands::eval::eval(
            &args.policy,
            &args.request,
            args.auth.as_deref(),
            settings.format,
        ),
        Commands::Test(args) => commands::test::test(&args.policy, &args.suite, settings.format),
        Commands::Watch(args) => {
            commands::watch::watch(&args.policy, &args.suite, settings.debounce, settings.format)
                .await?;
            Ok(0)
        }
    }
}
