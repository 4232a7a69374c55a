use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;

use hickory_resolver::error::ResolveError as DnsResolveError;

/// Top-level error type for the probe engine.
#[derive(Debug)]
pub enum Error {
    /// I/O error (socket, TLS transport).
    Io(IoError),
    /// DNS resolution error.
    Resolve(DnsResolveError),
    /// DNS label conversion error.
    Idna,
    /// Protocol-level error while driving an XMPP stream.
    Protocol(ProtocolError),
    /// OpenSSL error (context construction).
    Tls(openssl::error::ErrorStack),
    /// TLS handshake failure (version/cipher mismatch, alert, reset).
    TlsHandshake(openssl::ssl::Error),
    /// Deadline elapsed before the probe reached its goal state.
    Timeout,
    /// A caller-supplied argument combination makes no sense (surfaces before
    /// the engine runs, never recovered into a tag or a result).
    Usage(String),
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(fmt, "I/O error: {}", e),
            Error::Resolve(e) => write!(fmt, "DNS resolution error: {}", e),
            Error::Idna => write!(fmt, "IDNA error"),
            Error::Protocol(e) => write!(fmt, "protocol error: {}", e),
            Error::Tls(e) => write!(fmt, "TLS error: {}", e),
            Error::TlsHandshake(e) => write!(fmt, "TLS handshake failed: {}", e),
            Error::Timeout => write!(fmt, "deadline exceeded"),
            Error::Usage(msg) => write!(fmt, "usage error: {}", msg),
        }
    }
}

impl StdError for Error {}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

impl From<DnsResolveError> for Error {
    fn from(e: DnsResolveError) -> Self {
        Error::Resolve(e)
    }
}

impl From<idna::Errors> for Error {
    fn from(_e: idna::Errors) -> Self {
        Error::Idna
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<openssl::error::ErrorStack> for Error {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Error::Tls(e)
    }
}

impl From<openssl::ssl::Error> for Error {
    fn from(e: openssl::ssl::Error) -> Self {
        Error::TlsHandshake(e)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout
    }
}

/// XMPP stream-level protocol error.
#[derive(Debug)]
pub enum ProtocolError {
    /// XML parser error.
    Parser(rxml::error::Error),
    /// The peer sent `<stream:error/>`.
    StreamError,
    /// The peer closed the stream before `stream:features` arrived.
    StreamClosed,
    /// No `xmlns:stream` header received.
    InvalidStreamStart,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProtocolError::Parser(e) => write!(fmt, "XML parser error: {}", e),
            ProtocolError::StreamError => write!(fmt, "peer sent <stream:error/>"),
            ProtocolError::StreamClosed => write!(fmt, "stream closed before features"),
            ProtocolError::InvalidStreamStart => write!(fmt, "invalid <stream:stream> header"),
        }
    }
}

impl StdError for ProtocolError {}

impl From<rxml::error::Error> for ProtocolError {
    fn from(e: rxml::error::Error) -> Self {
        ProtocolError::Parser(e)
    }
}

impl From<rxml::error::Error> for Error {
    fn from(e: rxml::error::Error) -> Self {
        ProtocolError::Parser(e).into()
    }
}
