//! Emoji Retrieval CLI entry point.

use anyhow::Result;
use clap::Parser;

use emoji_retrieval::cli::{commands, handle_error, Cli, Commands};
use emoji_retrieval::{ConfigLoader, LoggerImpl, RetrievalContext};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        handle_error(err, json);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let _logger = LoggerImpl::init(&config.logging)?;
    let ctx = RetrievalContext::from_config(config).await?;

    match cli.command {
        Commands::Rank(args) => commands::rank::execute(&ctx, args, cli.json).await,
        Commands::Vectorize(args) => commands::vectorize::execute(&ctx, args, cli.json).await,
        Commands::Import(args) => commands::import::execute(&ctx, args, cli.json).await,
        Commands::Export(args) => commands::export::execute(&ctx, args, cli.json).await,
        Commands::Status => commands::status::execute(&ctx, cli.json).await,
    }
}
