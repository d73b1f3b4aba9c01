mod address;
mod dialer;
mod error;
mod handler;
mod handshake;
mod relay;
mod request;
mod server;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use address::Address;
use error::Error;

pub use server::Server;

const SOCKS5: u8 = 5;

const COMMAND_CONNECT: u8 = 0x01;

type Bytes = smallvec::SmallVec<[u8; 32]>;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Succeeded = 0x00,
    GeneralFailure = 0x01,
    NetworkUnreachable = 0x03,
    HostUnreachable = 0x04,
    ConnectionRefused = 0x05,
    CommandNotSupported = 0x07,
    AddressTypeNotSupported = 0x08,
}

/// Writes `VER REP RSV ATYP BND.ADDR BND.PORT`.
async fn write_reply(
    writer: &mut (impl AsyncWrite + Unpin),
    reply: Reply,
    address: &Address,
    port: u16,
) -> std::io::Result<()> {
    let mut buf = Bytes::new();
    buf.extend_from_slice(&[SOCKS5, reply as u8, 0x00]);
    address.encode(&mut buf);
    buf.extend_from_slice(&port.to_be_bytes());
    writer.write_all(&buf).await?;
    writer.flush().await
}

/// Writes a rejection reply carrying the zero IPv4 address and port.
async fn write_rejection(
    writer: &mut (impl AsyncWrite + Unpin),
    reply: Reply,
) -> std::io::Result<()> {
    write_reply(writer, reply, &Address::unspecified(), 0).await
}
