mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use configd_core::Config;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "configd=trace,configd_server=trace,configd_db=debug,configd_cache=debug,configd_broker=debug,tower_http=debug".to_string()
        } else {
            "configd=debug,configd_server=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(&env_filter)).init();

    match cli.command {
        Commands::Serve { listen } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve(listen))
        }
        Commands::Validate => validate(),
        Commands::GenerateApiKey => {
            println!("{}", configd_db::queries::applications::generate_api_key());
            Ok(())
        }
        Commands::Version => {
            println!("configd {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn serve(listen: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::from_env();
    if let Some(listen) = listen {
        config.server.listen_addr = listen;
    }

    tracing::info!("Starting configd server");
    tracing::info!(addr = %config.server.listen_addr, "binding");

    configd_server::start(config).await?;
    Ok(())
}

fn validate() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    let warnings = config.validate();
    if warnings.is_empty() {
        println!("configuration ok");
    } else {
        for warning in &warnings {
            println!("warning: {warning}");
        }
    }
    Ok(())
}
