use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use coingro_common::{response::print_error, shutdown::shutdown_signal};
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use crate::{
    args::{Cli, Commands, StartArgs},
    config::Config,
    controller::Controller,
    error::Error,
    server::{App, run_server},
    worker::Worker,
};

mod args;
mod config;
mod constants;
mod controller;
mod error;
mod k8s;
mod names;
mod persistence;
mod rpc;
mod server;
mod strategies;
mod worker;

#[tokio::main]
async fn main() -> ExitCode {
    coingro_common::init();

    // Exit the whole process when any task panics; the container runtime
    // restarts it with a clean slate.
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));

    let cli = Cli::parse();
    let Some(Commands::Start(start)) = cli.command else {
        eprintln!(
            "{}",
            "Usage of the coingro controller requires a subcommand to be specified.\n\
             To see the full list of options available, please use \
             `coingro-controller --help` or `coingro-controller <command> --help`."
                .red()
        );
        return ExitCode::from(1);
    };

    match run_start(start).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_operational() => {
            print_error(e);
            ExitCode::from(2)
        }
        Err(e) => {
            print_error(e);
            ExitCode::from(1)
        }
    }
}

async fn run_start(args: StartArgs) -> Result<(), Error> {
    let config = Config::load(&args)?;

    let controller = Controller::new(config.clone()).await?;
    let shared = Arc::new(tokio::sync::RwLock::new(controller));

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel_clone.cancel();
    });

    let server_handle = if config.api_server.enabled {
        let app_state = App::new(shared.clone());
        let api_config = config.api_server.clone();
        let cancel_clone = cancel.clone();
        Some(tokio::spawn(async move {
            run_server(cancel_clone, api_config, app_state).await
        }))
    } else {
        None
    };

    let mut worker = Worker::new(args, shared, cancel.clone(), &config);
    let result = worker.run().await;

    // The worker only returns once cancelled (or broken); make sure the
    // server winds down with it either way.
    cancel.cancel();
    if let Some(handle) = server_handle
        && let Ok(Err(e)) = handle.await
    {
        print_error(e);
    }
    result?;

    println!("{}", "🛑 Controller shut down gracefully.".red());
    Ok(())
}
