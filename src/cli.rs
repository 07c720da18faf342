use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "configd")]
#[command(author, version, about = "Multi-tenant remote configuration delivery service")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API, SSE, and admin server
    Serve {
        /// Override HTTP_LISTEN_ADDR
        #[arg(long)]
        listen: Option<String>,
    },

    /// Validate configuration loaded from the environment and report warnings
    Validate,

    /// Generate a random opaque API key, for seeding an application by hand
    GenerateApiKey,

    /// Display version information
    Version,
}
