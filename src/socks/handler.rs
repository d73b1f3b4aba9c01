use std::sync::Arc;
use std::time::Instant;

use compact_str::{format_compact, CompactString};
use slog::{error, info, warn};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;

use crate::config::Config;
use crate::socks::relay::{self, Outcome};
use crate::socks::request::{self, Request};
use crate::socks::{dialer, handshake, Error};

/// Drives one accepted connection from greeting to relay end.
pub struct Handler {
    pub logger: slog::Logger,
    pub config: Arc<Config>,
    pub peer: String,
}

impl Handler {
    /// Runs the connection to completion. Errors are logged here and never
    /// reach the accept loop.
    pub async fn handle(self, client: impl AsyncRead + AsyncWrite + Unpin) {
        if let Err(e) = self.handle_conn(client).await {
            match e {
                Error::Resolve { .. } | Error::Connect { .. } => {
                    warn!(self.logger, "{}: {}", self.peer, e)
                }
                _ => error!(self.logger, "{}: {}", self.peer, e),
            }
        }
    }

    async fn handle_conn(&self, client: impl AsyncRead + AsyncWrite + Unpin) -> Result<(), Error> {
        let started_at = Instant::now();

        let (mut client_reader, mut client_writer) = {
            let (r, w) = tokio::io::split(client);
            (BufReader::new(r), w)
        };

        let (target, upstream) = match self.establish(&mut client_reader, &mut client_writer).await {
            Ok(established) => established,
            Err(e) => {
                let _ = relay::shutdown_write(&mut client_writer).await;
                return Err(e);
            }
        };

        let (upstream_reader, upstream_writer) = {
            let (r, w) = upstream.into_split();
            (BufReader::new(r), w)
        };
        let outcome = relay::relay(
            client_reader,
            client_writer,
            upstream_reader,
            upstream_writer,
            self.config.max_idle_timeout,
            &self.logger,
        )
        .await;

        let elapsed = started_at.elapsed();
        match outcome {
            Outcome::Finished {
                uploaded,
                downloaded,
            } => info!(self.logger, "{} -/-> {}", self.peer, target;
                "downloaded_bytes" => downloaded,
                "uploaded_bytes" => uploaded,
                "elapsed" => ?elapsed,
            ),
            Outcome::IdleTimeout => warn!(self.logger, "{} -/-> {}", self.peer, target;
                "reason" => "idle timeout",
                "elapsed" => ?elapsed,
            ),
        }
        Ok(())
    }

    /// Handshake, request and dial. Returns the printable target and the
    /// connected upstream.
    async fn establish(
        &self,
        reader: &mut (impl AsyncBufRead + Unpin),
        writer: &mut (impl AsyncWrite + Unpin),
    ) -> Result<(CompactString, TcpStream), Error> {
        handshake::negotiate(reader, writer).await?;
        let Request { address, port } =
            request::read_request(reader, writer, self.config.allow_ipv6).await?;

        let target = format_compact!("{address}:{port}");
        info!(self.logger, "{} -> {}", self.peer, target);

        let upstream = dialer::dial(writer, &address, port, &self.config).await?;
        Ok((target, upstream))
    }
}
