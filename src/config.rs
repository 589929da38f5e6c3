use crate::server::ConnectionLimits;
use clap::{Args, Parser, Subcommand};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Trait for reading server configuration parameters
pub trait Config {
    fn log_path(&self) -> &Path;

    fn listen_addr(&self) -> SocketAddr;

    /// Start from an empty log regardless of what is stored
    fn reset(&self) -> bool;

    fn limits(&self) -> ConnectionLimits;
}

/// CLI configuration
#[derive(Parser, Debug)]
#[command(
    name = "bank-ledger",
    about = "A single-account ledger server backed by a hash-annotated transaction log",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Accept deposit/withdraw/balance commands over TCP
    Serve(ServeConfig),
    /// Sign a message, generating a fresh keypair unless a secret is given
    Sign(SignArgs),
    /// Verify a detached signature
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
pub struct ServeConfig {
    /// Path to the JSON transaction log
    #[arg(long, value_name = "FILE", default_value = "log.json")]
    log_path: PathBuf,

    /// Address to listen on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, default_value_t = 3876)]
    port: u16,

    /// Ignore the stored log and start from a zero balance
    #[arg(long)]
    reset: bool,

    /// Longest accepted inbound line in bytes
    #[arg(long, default_value_t = 64 * 1024)]
    max_frame_bytes: usize,

    /// Warn when a command takes longer than this many milliseconds
    #[arg(long, default_value_t = 1000)]
    slow_command_ms: u64,
}

impl Config for ServeConfig {
    fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    fn reset(&self) -> bool {
        self.reset
    }

    fn limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            max_frame_len: self.max_frame_bytes,
            slow_command: Duration::from_millis(self.slow_command_ms),
        }
    }
}

#[derive(Args, Debug)]
pub struct SignArgs {
    /// Message to sign
    #[arg(long)]
    pub message: String,

    /// Hex secret key (32-byte seed or 64-byte keypair)
    #[arg(long)]
    pub secret: Option<String>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Hex signature
    #[arg(long)]
    pub signature: String,

    /// Message that was signed
    #[arg(long)]
    pub message: String,

    /// Hex public key
    #[arg(long)]
    pub public_key: String,
}
