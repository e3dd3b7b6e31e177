use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newsdesk::app::AppContext;
use newsdesk::cli::{commands, Cli, Commands, InterestsAction};
use newsdesk::ingest::RunReport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `run --json` output stays parseable
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let ctx = match AppContext::new(cli.config.as_deref(), cli.db.clone(), cli.workers) {
        Ok(ctx) => ctx,
        Err(e) => {
            // A trigger still gets a failure report it can act on
            if let Commands::Run { json } = cli.command {
                commands::print_report(&RunReport::failure(&e), json)?;
                std::process::exit(1);
            }
            return Err(e.into());
        }
    };

    match cli.command {
        Commands::Run { json } => {
            let report = commands::run_ingestion(&ctx, json).await?;
            if !report.success {
                std::process::exit(1);
            }
        }
        Commands::Sources => {
            commands::list_sources(&ctx)?;
        }
        Commands::List {
            category,
            source,
            for_you,
            limit,
        } => {
            commands::list_records(&ctx, category, source, for_you.as_deref(), limit)?;
        }
        Commands::Interests { action } => match action {
            InterestsAction::Set { user, categories } => {
                commands::set_interests(&ctx, &user, &categories)?;
            }
            InterestsAction::Show { user } => {
                commands::show_interests(&ctx, &user)?;
            }
        },
        Commands::Watch {
            interval,
            no_initial_run,
        } => {
            commands::watch(ctx, &interval, no_initial_run).await?;
        }
    }

    Ok(())
}
