// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::time::Duration;

use futures::future::BoxFuture;
use hyper::body::Bytes;
use hyper::client::HttpConnector;
use hyper::header::HeaderMap;
use hyper::{Body, StatusCode};
use hyper_tls::HttpsConnector;

use crate::error::TransportError;

/// A POST to send, fully prepared.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub timeout: Duration,
}

/// What came back, whatever the status.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Sends a request and resolves once the whole response has been read.
///
/// `submit` is called synchronously when a call is dispatched; the
/// returned future is then driven on the caller's runtime. Implementations
/// are shared between concurrent calls and bring their own concurrency
/// discipline (connection pooling and the like).
pub trait Transport: Send + Sync + 'static {
    fn submit(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, TransportError>>;
}

/// The default transport: a pooled hyper client speaking http and https.
#[derive(Clone)]
pub struct HyperTransport {
    client: hyper::Client<HttpsConnector<HttpConnector>, Body>,
}

impl HyperTransport {
    pub fn new() -> HyperTransport {
        let https = HttpsConnector::new();
        HyperTransport {
            client: hyper::Client::builder().build::<_, Body>(https),
        }
    }
}

impl Default for HyperTransport {
    fn default() -> HyperTransport {
        HyperTransport::new()
    }
}

impl Transport for HyperTransport {
    fn submit(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, TransportError>> {
        let client = self.client.clone();

        Box::pin(async move {
            let mut builder = hyper::Request::post(request.uri.as_str());
            if let Some(headers) = builder.headers_mut() {
                headers.extend(request.headers);
            }
            let http_request = builder.body(Body::from(request.body))?;

            let exchange = async {
                let response = client.request(http_request).await?;
                let (parts, body) = response.into_parts();
                let body = hyper::body::to_bytes(body).await?;
                Ok::<_, TransportError>(HttpResponse {
                    status: parts.status,
                    headers: parts.headers,
                    body,
                })
            };

            match tokio::time::timeout(request.timeout, exchange).await {
                Ok(response) => response,
                Err(_) => Err(TransportError::Timeout(request.timeout)),
            }
        })
    }
}
