use std::process;

use serde::Serialize;
use sourcedeck::{
    application::{
        batch::run_batch,
        context::CommandContext,
        error::AppError,
        inspect::show_entry_for,
        list::{ListRequest, run_list},
    },
    config::{self, CacheCommand, Command},
    infra::telemetry,
};
use tracing::{Dispatch, Level, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    let ctx = CommandContext::from_settings(settings);

    match cli_args.command {
        Command::List(args) => {
            let report = run_list(&ctx, ListRequest::from(&args)).await?;
            print_json(&report)
        }
        Command::Batch(args) => {
            let results = run_batch(&ctx, args.paths).await?;
            print_json(&results)?;
            if results.iter().all(|item| item.is_ok()) {
                Ok(())
            } else {
                Err(AppError::unexpected("one or more batch paths failed"))
            }
        }
        Command::Cache(args) => match args.command {
            CacheCommand::Show(show) => print_json(&show_entry_for(&ctx, &show)?),
        },
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    println!("{out}");
    Ok(())
}
