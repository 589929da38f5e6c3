mod config;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Cli, CliCommand, SignArgs, VerifyArgs};
use ledger_core::signing::{self, Keypair};
use std::io;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        CliCommand::Serve(config) => {
            server::run(&config, shutdown_signal()).await?;
            info!("Server stopped");
        }
        CliCommand::Sign(args) => sign(&args)?,
        CliCommand::Verify(args) => verify(&args),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C, running until killed: {e}");
        std::future::pending::<()>().await;
    }
}

fn sign(args: &SignArgs) -> Result<()> {
    let (public, secret) = match &args.secret {
        Some(secret) => (None, secret.clone()),
        None => {
            let keypair = Keypair::generate();
            (Some(keypair.public), keypair.secret)
        }
    };

    let signature =
        signing::sign(args.message.as_bytes(), &secret).context("Failed to sign message")?;

    if let Some(public) = public {
        println!("PublicKey: {public}");
    }
    println!("Signature: {signature}");

    Ok(())
}

fn verify(args: &VerifyArgs) {
    let verified = signing::verify(&args.signature, args.message.as_bytes(), &args.public_key);

    println!("Verified: {verified}");
}
