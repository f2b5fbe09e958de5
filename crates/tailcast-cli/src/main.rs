//! CLI entry point.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use tailcast_cli::{Cli, CliConfig, bootstrap, exit_code_for, init_tracing, run};

#[tokio::main]
async fn main() {
    // Load environment variables before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = try_main(&cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(exit_code_for(&e));
    }
}

async fn try_main(cli: &Cli) -> anyhow::Result<()> {
    let config = CliConfig::from_cli(cli)?;
    let ctx = bootstrap(config).await?;
    info!(
        addr = %ctx.local_addr()?,
        command = %ctx.driver.spec(),
        "open the viewer in a browser"
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
        }
        signal.cancel();
    });

    run(ctx, shutdown).await
}
