//! shopsync CLI - run and inspect catalog syncs from the terminal.

mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, ProductCommands, ReviewCommands, SyncCommands, VendorCommands};
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::products::run_products_list;
use crate::commands::review::{run_review_expire, run_review_list, run_review_resolve};
use crate::commands::sync::{
    run_list_events, run_list_runs, run_retry, run_sync, SyncRunArgs,
};
use crate::commands::vendors::{run_vendor_add, run_vendor_list};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // .env is optional; environment always wins
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path.as_deref())?;

    match cli.command {
        Commands::Sync { command } => match command {
            SyncCommands::Run {
                vendor,
                job,
                direction,
                batch_size,
                max_pages,
                dry_run,
                vendor_priority,
                preserve_pricing,
                preserve_inventory,
                auto_merge,
                no_manual_review,
                include_unchanged,
                strict,
                json,
            } => {
                let args = SyncRunArgs {
                    vendor,
                    job,
                    direction,
                    batch_size,
                    max_pages,
                    dry_run,
                    vendor_priority,
                    preserve_pricing,
                    preserve_inventory,
                    auto_merge,
                    no_manual_review,
                    include_unchanged,
                    strict,
                    json,
                };
                run_sync(&args, &db_path).await
            }
            SyncCommands::Runs { limit, json } => run_list_runs(limit, json, &db_path).await,
            SyncCommands::Events {
                run_id,
                limit,
                json,
            } => run_list_events(&run_id, limit, json, &db_path).await,
            SyncCommands::Retry { run_id, json } => run_retry(&run_id, json, &db_path).await,
        },
        Commands::Review { command } => match command {
            ReviewCommands::List { limit, json } => run_review_list(limit, json, &db_path).await,
            ReviewCommands::Resolve { id, decision, data } => {
                run_review_resolve(&id, &decision, data.as_deref(), &db_path).await
            }
            ReviewCommands::Expire { older_than_days } => {
                run_review_expire(older_than_days, &db_path).await
            }
        },
        Commands::Products { command } => match command {
            ProductCommands::List {
                vendor,
                limit,
                json,
            } => run_products_list(&vendor, limit, json, &db_path).await,
        },
        Commands::Vendors { command } => match command {
            VendorCommands::Add { id, name, store } => {
                run_vendor_add(&id, &name, store, &db_path).await
            }
            VendorCommands::List { json } => run_vendor_list(json, &db_path).await,
        },
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
    }
}
