use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use compact_str::{format_compact, CompactString};
use smallvec::{smallvec, SmallVec};
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;

use crate::config::Config;
use crate::socks::{write_reply, Address, Error, Reply};

type Candidates = SmallVec<[SocketAddr; 4]>;

/// Connects to the requested target and answers the client.
///
/// On success the reply carries the address actually connected. On failure it
/// echoes the requested address and port with the mapped reply code.
pub async fn dial(
    writer: &mut (impl AsyncWrite + Unpin),
    address: &Address,
    port: u16,
    config: &Config,
) -> Result<TcpStream, Error> {
    let connected = match connect_to_upstream(address, port, config).await {
        Ok(upstream) => upstream
            .peer_addr()
            .map(|bound| (upstream, bound))
            .map_err(Error::Io),
        Err(err) => Err(err),
    };
    answer(writer, connected, address, port).await
}

async fn answer(
    writer: &mut (impl AsyncWrite + Unpin),
    connected: Result<(TcpStream, SocketAddr), Error>,
    address: &Address,
    port: u16,
) -> Result<TcpStream, Error> {
    match connected {
        Ok((upstream, bound)) => {
            write_reply(writer, Reply::Succeeded, &Address::from(bound), bound.port()).await?;
            Ok(upstream)
        }
        Err(err) => {
            // The connection is torn down either way.
            let _ = write_reply(writer, err.reply(), address, port).await;
            Err(err)
        }
    }
}

async fn connect_to_upstream(
    address: &Address,
    port: u16,
    config: &Config,
) -> Result<TcpStream, Error> {
    let candidates: Candidates = match address {
        Address::IPv4(ip) => smallvec![SocketAddr::from((Ipv4Addr::from(*ip), port))],
        Address::IPv6(ip) => smallvec![SocketAddr::from((Ipv6Addr::from(*ip), port))],
        Address::Domain(d) => {
            let host = std::str::from_utf8(d).map_err(|e| Error::Resolve {
                host: CompactString::from_utf8_lossy(d),
                source: io::Error::new(io::ErrorKind::InvalidData, e),
            })?;
            resolve(host, port, config.allow_ipv6).await?
        }
    };

    let target = format_compact!("{address}:{port}");
    match tokio::time::timeout(config.connect_timeout, connect_any(&candidates)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(Error::Connect { target, source }),
        Err(_) => Err(Error::Connect {
            target,
            source: io::Error::new(io::ErrorKind::TimedOut, "connection timed out"),
        }),
    }
}

async fn resolve(host: &str, port: u16, allow_ipv6: bool) -> Result<Candidates, Error> {
    let resolve_err = |source| Error::Resolve {
        host: host.into(),
        source,
    };
    let candidates: Candidates = tokio::net::lookup_host((host, port))
        .await
        .map_err(resolve_err)?
        .filter(|addr| allow_ipv6 || addr.is_ipv4())
        .collect();
    if candidates.is_empty() {
        return Err(resolve_err(io::Error::new(
            io::ErrorKind::NotFound,
            "no usable addresses",
        )));
    }
    Ok(candidates)
}

/// Tries each candidate in resolver order, returning the last error if none
/// accepts.
async fn connect_any(candidates: &[SocketAddr]) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in candidates {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "no addresses to connect to")
    }))
}
