use std::io;
use std::result;
use std::time::Duration;

use thiserror::Error;

use crate::xmlrpc::encoding::{EncodingError, ParseError};
use crate::xmlrpc::protocol::Fault;

pub type Result<T> = result::Result<T, Error>;

/// Everything a call can fail with. Construction and encoding errors are
/// returned synchronously; the rest reach the caller through the call's
/// completion.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported XML-RPC protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("invalid XML-RPC endpoint: {0}")]
    InvalidUri(String),

    #[error("cannot encode request: {0}")]
    Encoding(#[from] EncodingError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("malformed response: {0}")]
    MalformedResponse(#[from] ParseError),

    #[error("{0}")]
    Fault(Fault),

    #[error("no tokio runtime to dispatch the call on: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Error {
        Error::Fault(fault)
    }
}

/// Failures of the HTTP exchange itself, before any XML-RPC decoding.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid http request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("{url}: {code} {reason}")]
    Status {
        url: String,
        code: u16,
        reason: String,
    },
}
