use clap::{Args, Parser, Subcommand};

/// Real-time multi-project log collection and query gateway.
#[derive(Parser)]
#[command(name = "log-gateway")]
#[command(about = "Ingest, broadcast, and query multi-project logs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP/WS server.
    Serve(ServeArgs),
    /// One-shot: create/configure the engine index and exit.
    Init(EngineArgs),
}

#[derive(Args, Clone)]
pub struct EngineArgs {
    /// Base URL of the search engine.
    #[arg(long, env = "MEILI_HOST", default_value = "http://localhost:7700")]
    pub meili_host: String,

    /// Bearer key for the search engine.
    #[arg(long, env = "MEILI_KEY")]
    pub meili_key: Option<String>,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Port to bind the HTTP/WS server to.
    #[arg(long, default_value_t = 4800)]
    pub port: u16,

    #[command(flatten)]
    pub engine: EngineArgs,
}
