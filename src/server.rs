use crate::config::Config;
use anyhow::{bail, Context, Result};
use ledger_core::processor::CommandProcessor;
use ledger_core::storage::LogStorage;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Per-connection bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    /// Longest accepted inbound line, newline included
    pub max_frame_len: usize,
    /// How long a command may run before it is reported as slow
    pub slow_command: Duration,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            max_frame_len: 64 * 1024,
            slow_command: Duration::from_secs(1),
        }
    }
}

/// Open the ledger described by `config` and serve it until `shutdown` resolves
pub async fn run<C: Config>(config: &C, shutdown: impl Future<Output = ()>) -> Result<()> {
    let engine = ledger_core::open_ledger(config.log_path(), config.reset())
        .with_context(|| format!("Failed to open ledger at {}", config.log_path().display()))?;
    let processor = CommandProcessor::new(engine);

    let listener = TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr()))?;

    serve(listener, processor, config.limits(), shutdown).await
}

/// Accept connections, one task each, all sharing `processor`
pub async fn serve<S: LogStorage + 'static>(
    listener: TcpListener,
    processor: CommandProcessor<S>,
    limits: ConnectionLimits,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    info!("Ledger listening on {}", listener.local_addr()?);

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Failed to accept connection: {e}");
                        continue;
                    }
                };

                debug!("Connection from {peer}");
                let processor = processor.clone();

                tokio::spawn(async move {
                    match handle_connection(stream, processor, limits).await {
                        Ok(()) => debug!("Connection from {peer} closed"),
                        Err(e) => warn!("Connection from {peer} dropped: {e:#}"),
                    }
                });
            }
        }
    }
}

/// Request/response loop over newline-delimited JSON.
///
/// Each inbound line is one message; every response frame is written as its
/// own line. A line that is not JSON, or longer than
/// `limits.max_frame_len`, ends the connection.
pub async fn handle_connection<T, S>(
    stream: T,
    processor: CommandProcessor<S>,
    limits: ConnectionLimits,
) -> Result<()>
where
    T: AsyncRead + AsyncWrite,
    S: LogStorage + 'static,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let max_len = limits.max_frame_len as u64;

    loop {
        line.clear();
        let read = (&mut reader)
            .take(max_len + 1)
            .read_until(b'\n', &mut line)
            .await
            .context("Failed to read from connection")?;

        if read == 0 {
            break;
        }
        if line.len() > limits.max_frame_len {
            bail!("Frame exceeds {} bytes", limits.max_frame_len);
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let msg: Value = serde_json::from_slice(&line).context("Received a frame that is not JSON")?;

        // Engine calls do synchronous file I/O
        let worker = processor.clone();
        let mut task = tokio::task::spawn_blocking(move || worker.process(&msg));
        let joined = match tokio::time::timeout(limits.slow_command, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    "Command still running after {:?}, waiting for it to finish",
                    limits.slow_command
                );
                task.await
            }
        };
        let responses = joined.context("Command processing task failed")?;

        for response in responses {
            let mut frame = serde_json::to_vec(&response).context("Failed to encode response")?;
            frame.push(b'\n');
            writer
                .write_all(&frame)
                .await
                .context("Failed to write to connection")?;
        }
        writer.flush().await.context("Failed to flush connection")?;
    }

    Ok(())
}
