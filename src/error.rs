use std::io;

use crate::net::AddressClass;

/// Everything that can end a session or fail to set one up.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The host interface list could not be read.
    #[error("failed to enumerate network interfaces: {0}")]
    Interfaces(#[source] io::Error),

    #[error("unable to find a {0} ipv4 address")]
    NoAddress(AddressClass),

    #[error("failed to bind listener: {0}")]
    Bind(#[source] io::Error),

    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    #[error("listener closed")]
    ListenerClosed,

    #[error("unable to find a valid destination")]
    NoDestination,

    /// The encoder could not be constructed or started.
    #[error(transparent)]
    Encoder(#[from] anyhow::Error),

    #[error("canceled")]
    Canceled,

    #[error("timeout")]
    Timeout,

    /// The encoder dropped its status channel without reporting a terminal code.
    #[error("encoder status channel closed")]
    StatusClosed,
}

impl Error {
    /// The process exit code a binary should use for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Timeout => 2,
            Self::Canceled => 130,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(Error::Timeout.exit_code(), 2);
        assert_eq!(Error::Canceled.exit_code(), 130);
        assert_eq!(Error::NoDestination.exit_code(), 1);
        assert_eq!(Error::NoAddress(AddressClass::Private).exit_code(), 1);
    }

    #[test]
    fn encoder_errors_are_transparent() {
        let err = Error::from(anyhow::anyhow!("spawn failed"));
        assert_eq!(err.to_string(), "spawn failed");
    }
}
