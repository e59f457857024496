//! An asynchronous XML-RPC client.
//!
//! Calls are encoded, POSTed through a [`Transport`] and completed on the
//! caller's tokio runtime, where the result (or the fault, or whatever went
//! wrong on the way) is handed to a callback.

#[macro_use]
extern crate log;

pub mod config;
pub mod error;
pub mod xmlrpc;

pub use config::ClientConfig;
pub use error::{Error, Result, TransportError};
pub use xmlrpc::client::Client;
pub use xmlrpc::endpoint::Endpoint;
pub use xmlrpc::protocol::Fault;
pub use xmlrpc::proxy::MethodProxy;
pub use xmlrpc::transport::{HttpRequest, HttpResponse, HyperTransport, Transport};
pub use xmlrpc::value::Value;
