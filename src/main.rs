mod cli;
mod db;
mod desk_review;
mod error;
mod export;
mod fmt;
mod models;
mod normalizer;
#[cfg(feature = "pdf")]
mod pdf;
mod pipeline;
mod reports;
mod settings;
mod validator;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands};

fn init_tracing(verbose: bool) {
    let default = if verbose { "deskreview=debug" } else { "deskreview=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = cli.config.as_ref();

    let result = match cli.command {
        Commands::Run {
            input,
            contacts,
            db,
            export_dir,
            no_export,
            overrides,
        } => cli::run::run(
            config,
            cli::run::RunArgs {
                input,
                contacts,
                db,
                export_dir,
                no_export,
            },
            &overrides,
        ),
        Commands::Findings { db } => cli::findings::run(config, db),
        #[cfg(feature = "pdf")]
        Commands::Letters { db, output_dir } => cli::letters::run(config, db, output_dir),
        Commands::Config { overrides, save } => cli::config::run(config, &overrides, save),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
