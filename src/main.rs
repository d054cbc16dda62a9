use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use seccheck_receiver::{Server, StdoutSink, DEFAULT_SOCKET_PATH};

#[derive(Parser)]
#[command(name = "seccheck-server")]
#[command(version, about = "Receive and print sandbox security-check events")]
struct Cli {
    /// Socket path to listen on
    #[arg(default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,
}

async fn serve(cli: Cli) -> seccheck_receiver::Result<()> {
    let server = Server::builder().socket_path(cli.socket).bind().await?;

    tokio::select! {
        result = server.run(StdoutSink::new()) => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match serve(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
