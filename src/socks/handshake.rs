use smallvec::smallvec;
use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::socks::{Bytes, Error, SOCKS5};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthMethod {
    None = 0x00,
    NoAcceptableMethods = 0xff,
}

/// Runs method negotiation. Only "no authentication required" is offered.
///
/// A wrong version byte fails without a reply; a method list lacking
/// no-auth is answered with `05 FF` before failing.
pub async fn negotiate(
    reader: &mut (impl AsyncBufRead + Unpin),
    writer: &mut (impl AsyncWrite + Unpin),
) -> Result<(), Error> {
    let version = reader.read_u8().await.map_err(Error::from_read)?;
    if version != SOCKS5 {
        return Err(Error::UnsupportedVersion(version));
    }

    let methods = read_available_methods(reader).await?;
    if methods.contains(&(AuthMethod::None as u8)) {
        write_server_choice(writer, AuthMethod::None).await?;
        return Ok(());
    }

    write_server_choice(writer, AuthMethod::NoAcceptableMethods).await?;
    Err(Error::NoAcceptableMethod)
}

async fn read_available_methods(reader: &mut (impl AsyncBufRead + Unpin)) -> Result<Bytes, Error> {
    let n_methods = reader.read_u8().await.map_err(Error::from_read)?;
    let mut buf = smallvec![0u8; n_methods as usize];
    reader.read_exact(&mut buf).await.map_err(Error::from_read)?;
    Ok(buf)
}

async fn write_server_choice(
    writer: &mut (impl AsyncWrite + Unpin),
    chosen_auth_method: AuthMethod,
) -> Result<(), Error> {
    writer.write_all(&[SOCKS5, chosen_auth_method as u8]).await?;
    writer.flush().await?;
    Ok(())
}
