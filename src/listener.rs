//! Listening sockets the proxy can serve on.
//!
//! TCP ports and Unix-domain sockets both accept into a [`Stream`] plus a
//! printable peer identifier, so the SOCKS handler never sees which one it
//! is talking to.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

use crate::config::{Config, ListenMode};

pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Local(LocalListener),
}

/// Unix listener that removes its socket file when closed.
#[cfg(unix)]
pub struct LocalListener {
    inner: UnixListener,
    path: std::path::PathBuf,
}

#[cfg(unix)]
impl Drop for LocalListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    Tcp(SocketAddr),
    Local(String),
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddr::Tcp(addr) => write!(f, "{addr}"),
            ListenAddr::Local(name) => write!(f, "local:{name}"),
        }
    }
}

impl Listener {
    pub async fn bind(config: &Config) -> io::Result<Self> {
        match config.listen_mode {
            ListenMode::Port => {
                let listener = TcpListener::bind((config.bind_ip, config.port)).await?;
                Ok(Listener::Tcp(listener))
            }
            #[cfg(unix)]
            ListenMode::LocalSocket => {
                let path = std::path::PathBuf::from(&config.socket_name);
                let inner = UnixListener::bind(&path)?;
                Ok(Listener::Local(LocalListener { inner, path }))
            }
            #[cfg(not(unix))]
            ListenMode::LocalSocket => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "local sockets are not supported on this platform",
            )),
        }
    }

    pub fn local_addr(&self) -> io::Result<ListenAddr> {
        match self {
            Listener::Tcp(l) => l.local_addr().map(ListenAddr::Tcp),
            #[cfg(unix)]
            Listener::Local(l) => Ok(ListenAddr::Local(l.path.display().to_string())),
        }
    }

    /// Waits for the next connection and returns it with a peer identifier.
    pub async fn accept(&self) -> io::Result<(Stream, String)> {
        match self {
            Listener::Tcp(l) => {
                let (stream, addr) = l.accept().await?;
                Ok((Stream::Tcp(stream), addr.to_string()))
            }
            #[cfg(unix)]
            Listener::Local(l) => {
                let (stream, addr) = l.inner.accept().await?;
                let peer = match addr.as_pathname() {
                    Some(path) => path.display().to_string(),
                    None => "local".to_string(),
                };
                Ok((Stream::Local(stream), peer))
            }
        }
    }
}

/// An accepted client connection.
pub enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Local(UnixStream),
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(unix)]
            Stream::Local(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(unix)]
            Stream::Local(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(unix)]
            Stream::Local(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(unix)]
            Stream::Local(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}
