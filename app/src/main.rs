use clap::Parser;
use log_gateway::config::{Cli, Command};
use log_gateway::{run_init, run_serve, setup_logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Init(args) => run_init(args).await,
    }
}
