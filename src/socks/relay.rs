use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use slog::debug;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

/// How a relay session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Both directions reached EOF or failed.
    Finished { uploaded: u64, downloaded: u64 },
    /// Neither direction carried data for the idle window.
    IdleTimeout,
}

/// Last time either pump moved data, as an offset from session start.
struct Liveness {
    origin: Instant,
    last_millis: AtomicU64,
}

impl Liveness {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_millis: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.last_millis.fetch_max(elapsed, Ordering::Relaxed);
    }

    fn deadline(&self, idle_timeout: Duration) -> Instant {
        self.origin + Duration::from_millis(self.last_millis.load(Ordering::Relaxed)) + idle_timeout
    }
}

/// Copies client→target and target→client until both sides finish or the
/// session goes idle for `idle_timeout`.
///
/// Dropping the halves on timeout closes both streams.
pub async fn relay(
    client_reader: impl AsyncBufRead + Unpin,
    client_writer: impl AsyncWrite + Unpin,
    upstream_reader: impl AsyncBufRead + Unpin,
    upstream_writer: impl AsyncWrite + Unpin,
    idle_timeout: Duration,
    logger: &slog::Logger,
) -> Outcome {
    let liveness = Liveness::new();
    let pumps = async {
        tokio::join!(
            pump(client_reader, upstream_writer, &liveness, logger, "upload"),
            pump(upstream_reader, client_writer, &liveness, logger, "download"),
        )
    };
    tokio::pin!(pumps);

    loop {
        tokio::select! {
            (uploaded, downloaded) = &mut pumps => {
                return Outcome::Finished { uploaded, downloaded };
            }
            _ = tokio::time::sleep_until(liveness.deadline(idle_timeout)) => {
                if liveness.deadline(idle_timeout) <= Instant::now() {
                    return Outcome::IdleTimeout;
                }
            }
        }
    }
}

/// Moves bytes in one direction, then half-closes the destination.
async fn pump(
    mut reader: impl AsyncBufRead + Unpin,
    mut writer: impl AsyncWrite + Unpin,
    liveness: &Liveness,
    logger: &slog::Logger,
    direction: &'static str,
) -> u64 {
    let mut transferred = 0u64;
    loop {
        let chunk = match reader.fill_buf().await {
            Ok([]) => break,
            Ok(chunk) => chunk,
            Err(e) => {
                debug!(logger, "read failed"; "direction" => direction, "err" => %e);
                break;
            }
        };
        liveness.touch();
        let n = chunk.len();
        if let Err(e) = writer.write_all(chunk).await {
            if !is_closed(&e) {
                debug!(logger, "write failed"; "direction" => direction, "err" => %e);
            }
            break;
        }
        reader.consume(n);
        transferred += n as u64;
    }
    if let Err(e) = shutdown_write(&mut writer).await {
        debug!(logger, "shutdown failed"; "direction" => direction, "err" => %e);
    }
    transferred
}

/// Half-closes `writer`, treating an already-closed peer as success.
pub async fn shutdown_write(writer: &mut (impl AsyncWrite + Unpin)) -> io::Result<()> {
    match writer.shutdown().await {
        Err(e) if is_closed(&e) => Ok(()),
        other => other,
    }
}

fn is_closed(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}
