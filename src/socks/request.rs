use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWrite};

use crate::socks::{write_rejection, Address, Error, COMMAND_CONNECT, SOCKS5};

/// A validated CONNECT request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub address: Address,
    pub port: u16,
}

/// Reads `VER CMD RSV ATYP DST.ADDR DST.PORT`.
///
/// Unsupported commands and address types are answered with the matching
/// reply before the error is returned. A bad version byte is not answered.
pub async fn read_request(
    reader: &mut (impl AsyncBufRead + Unpin),
    writer: &mut (impl AsyncWrite + Unpin),
    allow_ipv6: bool,
) -> Result<Request, Error> {
    let mut header = [0u8; 3];
    reader
        .read_exact(&mut header)
        .await
        .map_err(Error::from_read)?;
    let [version, command, _reserved] = header;
    if version != SOCKS5 {
        return Err(Error::UnsupportedVersion(version));
    }
    if command != COMMAND_CONNECT {
        let err = Error::UnsupportedCommand(command);
        write_rejection(writer, err.reply()).await?;
        return Err(err);
    }

    let address = match Address::decode(reader, allow_ipv6).await {
        Ok(address) => address,
        Err(err @ (Error::UnsupportedAddressType(_) | Error::Ipv6Disallowed)) => {
            write_rejection(writer, err.reply()).await?;
            return Err(err);
        }
        Err(err) => return Err(err),
    };
    let port = reader.read_u16().await.map_err(Error::from_read)?;

    Ok(Request { address, port })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socks::Bytes;

    async fn run(frame: &[u8], allow_ipv6: bool) -> (Result<Request, Error>, Vec<u8>) {
        let mut reader = frame;
        let mut writer = Vec::new();
        let result = read_request(&mut reader, &mut writer, allow_ipv6).await;
        (result, writer)
    }

    #[tokio::test]
    async fn parses_ipv4_connect() {
        let (result, written) = run(&[0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x50], false).await;
        let request = result.unwrap();
        assert_eq!(request.address, Address::IPv4([127, 0, 0, 1]));
        assert_eq!(request.port, 80);
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn parses_domain_connect() {
        let (result, _) = run(b"\x05\x01\x00\x03\x0bexample.com\x01\xbb", false).await;
        let request = result.unwrap();
        assert_eq!(request.address, Address::Domain(Bytes::from_slice(b"example.com")));
        assert_eq!(request.port, 443);
    }

    #[tokio::test]
    async fn parses_ipv6_connect_when_allowed() {
        let mut frame = vec![0x05, 0x01, 0x00, 0x04];
        frame.extend_from_slice(&std::net::Ipv6Addr::LOCALHOST.octets());
        frame.extend_from_slice(&[0x1f, 0x90]);
        let (result, _) = run(&frame, true).await;
        let request = result.unwrap();
        assert_eq!(
            request.address,
            Address::IPv6(std::net::Ipv6Addr::LOCALHOST.octets())
        );
        assert_eq!(request.port, 8080);
    }

    #[tokio::test]
    async fn bind_is_rejected_with_command_not_supported() {
        let (result, written) = run(&[0x05, 0x02, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x50], false).await;
        assert!(matches!(result, Err(Error::UnsupportedCommand(0x02))));
        assert_eq!(written, [0x05, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn ipv6_is_rejected_when_disallowed() {
        let mut frame = vec![0x05, 0x01, 0x00, 0x04];
        frame.extend_from_slice(&[0u8; 16]);
        frame.extend_from_slice(&[0x00, 0x50]);
        let (result, written) = run(&frame, false).await;
        assert!(matches!(result, Err(Error::Ipv6Disallowed)));
        assert_eq!(written, [0x05, 0x08, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn unknown_address_type_is_rejected() {
        let (result, written) = run(&[0x05, 0x01, 0x00, 0x07, 0x00, 0x50], true).await;
        assert!(matches!(result, Err(Error::UnsupportedAddressType(0x07))));
        assert_eq!(written, [0x05, 0x08, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn wrong_version_gets_no_reply() {
        let (result, written) = run(&[0x04, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x50], false).await;
        assert!(matches!(result, Err(Error::UnsupportedVersion(4))));
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn missing_port_is_malformed() {
        let (result, written) = run(&[0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0x00], false).await;
        assert!(matches!(result, Err(Error::MalformedRequest(_))));
        assert!(written.is_empty());
    }
}
