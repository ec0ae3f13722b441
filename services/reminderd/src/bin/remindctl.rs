//! services/reminderd/src/bin/remindctl.rs
//!
//! Manage stored reminders from the command line.

use clap::Parser;
use reminderd_lib::{
    adapters::DbAdapter,
    cli::{self, Cli},
    config::Config,
    error::DaemonError,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("remindctl failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), DaemonError> {
    let config = Config::from_env()?;
    let db_adapter = DbAdapter::new(DbAdapter::connect(&config.database_url).await?);
    db_adapter.run_migrations().await?;

    let output = cli::execute(&db_adapter, cli.command, chrono::Utc::now().timestamp()).await?;
    println!("{output}");
    Ok(())
}
