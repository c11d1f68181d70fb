use anyhow::Result;
use clap::Parser;
use filing_rag_cli::cli::{Cli, Command};
use filing_rag_cli::{commands, settings, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal; the process environment may already be set.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    telemetry::init(cli.verbose, cli.log_json);

    let figment = settings::figment(cli.config.as_deref())?;

    match cli.command {
        Command::Ask { corpus, question, json } => {
            let config = settings::resolve(&figment, &corpus)?;
            commands::ask(config, &corpus.files, &question, json).await
        }
        Command::Chat { corpus } => {
            let config = settings::resolve(&figment, &corpus)?;
            commands::chat(config, &corpus.files).await
        }
        Command::Retrieve { corpus, question, offline } => {
            let config = settings::resolve(&figment, &corpus)?;
            commands::retrieve(config, &corpus.files, &question, offline).await
        }
        Command::Chunk { files, preview } => {
            let config = settings::extract(&figment)?;
            commands::chunk(&config, &files, preview)
        }
    }
}
