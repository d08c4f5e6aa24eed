use anyhow::Result;
use clap::Parser;

use logpilot_daemon::cli::DaemonCli;
use logpilot_daemon::{bootstrap, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = bootstrap::load_config(&cli).await?;

    if cli.validate {
        println!("configuration is valid");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    bootstrap::run(config).await
}
