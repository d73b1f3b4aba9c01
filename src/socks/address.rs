use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use smallvec::smallvec;
use tokio::io::{AsyncBufRead, AsyncReadExt};

use crate::socks::{Bytes, Error};

const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// Target address as carried in SOCKS5 requests and replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    IPv4([u8; 4]),
    IPv6([u8; 16]),
    /// Raw name bytes as sent by the client, echoed back verbatim.
    Domain(Bytes),
}

impl Address {
    /// Reads an ATYP byte followed by its payload.
    pub async fn decode(
        reader: &mut (impl AsyncBufRead + Unpin),
        allow_ipv6: bool,
    ) -> Result<Address, Error> {
        let atyp = reader.read_u8().await.map_err(Error::from_read)?;
        let address = match atyp {
            ATYP_IPV4 => {
                let mut ipv4_buf = [0u8; 4];
                reader
                    .read_exact(&mut ipv4_buf)
                    .await
                    .map_err(Error::from_read)?;
                Address::IPv4(ipv4_buf)
            }
            ATYP_IPV6 => {
                if !allow_ipv6 {
                    return Err(Error::Ipv6Disallowed);
                }
                let mut ipv6_buf = [0u8; 16];
                reader
                    .read_exact(&mut ipv6_buf)
                    .await
                    .map_err(Error::from_read)?;
                Address::IPv6(ipv6_buf)
            }
            ATYP_DOMAIN => {
                let len = reader.read_u8().await.map_err(Error::from_read)?;
                let mut buf: Bytes = smallvec![0u8; len as usize];
                reader.read_exact(&mut buf).await.map_err(Error::from_read)?;
                Address::Domain(buf)
            }
            x => return Err(Error::UnsupportedAddressType(x)),
        };
        Ok(address)
    }

    /// Appends ATYP and payload to `buf`.
    ///
    /// Domain names longer than 255 bytes must be rejected by the caller.
    pub fn encode(&self, buf: &mut Bytes) {
        match self {
            Address::IPv4(ip) => {
                buf.push(ATYP_IPV4);
                buf.extend_from_slice(ip);
            }
            Address::IPv6(ip) => {
                buf.push(ATYP_IPV6);
                buf.extend_from_slice(ip);
            }
            Address::Domain(d) => {
                debug_assert!(d.len() <= u8::MAX as usize);
                buf.push(ATYP_DOMAIN);
                buf.push(d.len() as u8);
                buf.extend_from_slice(d);
            }
        }
    }

    /// The all-zero IPv4 address used in rejection replies.
    pub fn unspecified() -> Address {
        Address::IPv4([0; 4])
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Address::IPv4(v4.ip().octets()),
            SocketAddr::V6(v6) => match v6.ip().to_ipv4_mapped() {
                Some(v4) => Address::IPv4(v4.octets()),
                None => Address::IPv6(v6.ip().octets()),
            },
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::IPv4(ip) => write!(f, "{}", Ipv4Addr::from(*ip)),
            Address::IPv6(ip) => write!(f, "[{}]", Ipv6Addr::from(*ip)),
            Address::Domain(d) => f.write_str(&String::from_utf8_lossy(d)),
        }
    }
}
