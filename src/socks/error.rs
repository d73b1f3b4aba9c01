use std::io;

use compact_str::CompactString;

use crate::socks::Reply;

/// Errors that end a single SOCKS connection before or while dialing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    #[error("no acceptable auth methods")]
    NoAcceptableMethod,

    #[error("command not supported: {0}")]
    UnsupportedCommand(u8),

    #[error("unknown address type: {0}")]
    UnsupportedAddressType(u8),

    #[error("IPv6 target requested but IPv6 is not allowed")]
    Ipv6Disallowed,

    #[error("malformed request: {0}")]
    MalformedRequest(#[source] io::Error),

    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: CompactString,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to upstream {target}: {source}")]
    Connect {
        target: CompactString,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Wraps a read error from the client, treating a premature EOF as a
    /// truncated frame.
    pub(crate) fn from_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::MalformedRequest(err)
        } else {
            Error::Io(err)
        }
    }

    /// Reply code sent to the client when a dial fails with this error.
    pub fn reply(&self) -> Reply {
        match self {
            Error::Resolve { .. } => Reply::HostUnreachable,
            Error::Connect { source, .. } => match source.kind() {
                io::ErrorKind::ConnectionRefused => Reply::ConnectionRefused,
                io::ErrorKind::NetworkUnreachable => Reply::NetworkUnreachable,
                _ => Reply::GeneralFailure,
            },
            Error::UnsupportedCommand(_) => Reply::CommandNotSupported,
            Error::UnsupportedAddressType(_) | Error::Ipv6Disallowed => {
                Reply::AddressTypeNotSupported
            }
            _ => Reply::GeneralFailure,
        }
    }
}
