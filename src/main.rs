use anyhow::Result;
use clap::Parser;
use insight_agents::{cli, launch, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    let question = args.question.clone();
    let config = args.into_config()?;

    logging::init(&config)?;

    launch(&config, question).await
}
