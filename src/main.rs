use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use config::{Cli, Command, Config, ServiceAddr};
use controller::{Client, InteractiveLock};
use tracing::error;

mod config;
mod controller;
mod entity;
mod usecase;

fn init_logging(verbose: bool, interactive: &InteractiveLock) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(interactive.clone())
        .with_ansi(false)
        .init();
}

async fn connect(addr: &ServiceAddr) -> anyhow::Result<Client> {
    Client::connect(&addr.host, addr.port).await
}

async fn run(cli: Cli, interactive: InteractiveLock) -> anyhow::Result<()> {
    match cli.command {
        Command::Gen(args) => {
            let cwd = std::env::current_dir().context("failed to read the working directory")?;
            let config = Config::from_args(args, &cwd);
            controller::generate::run(config, interactive).await
        }
        //stdout of the two commands below is read back by the generator
        Command::Deps(args) => {
            let deps = connect(&args.addr).await?.deps(&args.descriptors).await?;
            for dep in deps {
                println!("{dep}");
            }
            Ok(())
        }
        Command::Type(addr) => {
            let cwd = std::env::current_dir().context("failed to read the working directory")?;
            let target_type = connect(&addr).await?.target_type(&cwd).await?;
            println!("{target_type}");
            Ok(())
        }
        Command::Log(args) => connect(&args.addr).await?.log(&args.text.join(" ")).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbose = matches!(&cli.command, Command::Gen(args) if args.verbose);

    let interactive = InteractiveLock::new();
    init_logging(verbose, &interactive);

    match run(cli, interactive).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
