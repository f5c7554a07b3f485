#![allow(unused)]

use crate::prelude::*;
use clap::Parser;

mod api;
mod error;
mod mcp;
mod prelude;
mod query;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Typed client, CLI, and MCP tools for the Honeycomb query API"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Honeycomb API key
    #[clap(long, env = "HONEYCOMB_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Honeycomb API base URL
    #[clap(
        long,
        env = "HONEYCOMB_API_URL",
        global = true,
        default_value = "https://api.honeycomb.io"
    )]
    api_url: String,

    /// Whether to display additional information.
    #[clap(long, env = "HNYTOOLS_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Run analytics queries against a dataset
    Query(crate::query::App),

    /// Model Context Protocol server
    MCP(crate::mcp::App),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Query(sub_app) => crate::query::run(sub_app, app.global).await,
        SubCommands::MCP(sub_app) => crate::mcp::run(sub_app, app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
