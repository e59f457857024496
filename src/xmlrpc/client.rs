// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::sync::Arc;

use futures::future::BoxFuture;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use tokio::runtime::Handle;

use crate::config::ClientConfig;
use crate::error::{Error, Result, TransportError};
use crate::xmlrpc::endpoint::Endpoint;
use crate::xmlrpc::protocol::{Request, Response};
use crate::xmlrpc::proxy::MethodProxy;
use crate::xmlrpc::transport::{HttpRequest, HyperTransport, Transport};
use crate::xmlrpc::value::Value;

/// An asynchronous XML-RPC client.
///
/// Calls are dispatched without blocking: `request` hands the encoded call
/// to the transport and returns, and the callback runs later on the tokio
/// runtime once the response is in. Cloning is cheap and clones share the
/// endpoint and the transport.
///
/// ```no_run
/// use async_xmlrpc::{Client, Value};
///
/// # async fn run() -> async_xmlrpc::Result<()> {
/// let client = Client::new("http://example.com/")?;
/// client.method("add_numbers").call(
///     |result| println!("{:?}", result),
///     vec![Value::from(1), Value::from(2)],
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    endpoint: Endpoint,
    config: ClientConfig,
    transport: Box<dyn Transport>,
}

impl Client {
    pub fn new(uri: &str) -> Result<Client> {
        Client::with_config(uri, ClientConfig::default())
    }

    pub fn with_config(uri: &str, config: ClientConfig) -> Result<Client> {
        Client::with_transport(uri, config, HyperTransport::new())
    }

    pub fn with_transport<T: Transport>(uri: &str, config: ClientConfig, transport: T) -> Result<Client> {
        let endpoint = Endpoint::parse(uri)?;
        Ok(Client {
            inner: Arc::new(Inner {
                endpoint,
                config,
                transport: Box::new(transport),
            }),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// A proxy with no name; each `attr` adds a segment.
    pub fn proxy(&self) -> MethodProxy<'_> {
        MethodProxy::root(self)
    }

    /// Starts a method name; chain `attr` for dotted names.
    pub fn method(&self, name: &str) -> MethodProxy<'_> {
        MethodProxy::new(self, name)
    }

    /// Calls `method_name` and hands the outcome to `callback` once the
    /// response is in.
    ///
    /// Returns as soon as the request has been handed to the transport.
    /// Encoding failures, and calling this outside a tokio runtime, are
    /// reported here and nothing is sent; everything after that (transport
    /// failures, HTTP errors, faults, unreadable responses) is passed to the
    /// callback, which runs exactly once.
    pub fn request<F>(&self, method_name: &str, callback: F, params: Vec<Value>) -> Result<()>
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        let runtime = Handle::try_current()?;
        let pending = self.submit(method_name, params)?;
        runtime.spawn(async move {
            callback(pending.await);
        });
        Ok(())
    }

    /// Awaitable form of `request`.
    pub async fn call(&self, method_name: &str, params: Vec<Value>) -> Result<Value> {
        self.submit(method_name, params)?.await
    }

    /// Decodes a `methodResponse` body into the call's result.
    ///
    /// A single returned value is unwrapped. Zero or several values, which
    /// a conforming server never sends, come back as a `Value::Array`.
    pub fn parse(body: &[u8]) -> Result<Value> {
        match Response::from_xml(body)? {
            Response::Fault(fault) => Err(Error::Fault(fault)),
            Response::Params(mut params) => {
                if params.len() == 1 {
                    Ok(params.remove(0))
                } else {
                    Ok(Value::Array(params))
                }
            }
        }
    }

    /// Encodes the call, hands it to the transport and returns the
    /// continuation that checks and decodes the response.
    fn submit(&self, method_name: &str, params: Vec<Value>) -> Result<BoxFuture<'static, Result<Value>>> {
        let inner = &self.inner;
        let request = Request {
            method: method_name.to_string(),
            params,
        };
        let body = request.to_xml(inner.config.allow_none)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/xml"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        if let Ok(user_agent) = HeaderValue::from_str(&inner.config.user_agent) {
            headers.insert(USER_AGENT, user_agent);
        }

        let uri = inner.endpoint.uri().to_string();
        debug!("Send XML-RPC request {} to: {}", method_name, uri);
        trace!("XML-RPC body: {}", body);

        let response = inner.transport.submit(HttpRequest {
            uri: uri.clone(),
            headers,
            body: body.into(),
            timeout: inner.config.timeout,
        });

        let method = request.method;
        Ok(Box::pin(async move {
            let response = response.await.map_err(|err| {
                warn!("XML-RPC call {} to {} failed: {}", method, uri, err);
                err
            })?;

            // the body of a failed exchange is not an XML-RPC response
            if !response.status.is_success() {
                warn!("XML-RPC call {} to {} answered {}", method, uri, response.status);
                return Err(TransportError::Status {
                    url: uri,
                    code: response.status.as_u16(),
                    reason: response.status.canonical_reason().unwrap_or("").to_string(),
                }
                .into());
            }

            trace!("Response body: {}", String::from_utf8_lossy(&response.body));
            let result = Client::parse(&response.body);
            match result {
                Ok(ref value) => debug!("XML-RPC call {} returned a {}", method, value.type_name()),
                Err(Error::Fault(ref fault)) => warn!("XML-RPC call {} returned {}", method, fault),
                Err(ref err) => warn!("XML-RPC call {} to {}: {}", method, uri, err),
            }
            result
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::Client;
    use crate::config::ClientConfig;
    use crate::error::{Error, TransportError};
    use crate::xmlrpc::encoding::{EncodingError, ParseError};
    use crate::xmlrpc::protocol::{Fault, Request, Response};
    use crate::xmlrpc::transport::{HttpRequest, HttpResponse, Transport};
    use crate::xmlrpc::value::Value;
    use futures::future::{self, BoxFuture, FutureExt};
    use hyper::body::Bytes;
    use hyper::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
    use hyper::StatusCode;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use time::macros::datetime;
    use tokio::sync::oneshot;

    type Reply = Result<HttpResponse, TransportError>;

    fn ok(body: impl Into<Bytes>) -> HttpResponse {
        HttpResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    fn answer(response: Response) -> HttpResponse {
        ok(response.to_xml(true).unwrap())
    }

    /// A tiny in-memory server: decodes the call and answers it.
    #[derive(Default)]
    struct Server {
        seen: Arc<Mutex<Vec<HttpRequest>>>,
    }

    impl Server {
        fn dispatch(request: &Request) -> Response {
            match request.method.as_str() {
                "add" => {
                    let sum = request.params.iter().filter_map(Value::as_i64).sum::<i64>();
                    Response::Params(vec![Value::Int(sum)])
                }
                "system.listMethods" => Response::Params(vec![Value::from(vec!["add", "system.listMethods"])]),
                "pair" => Response::Params(vec![Value::from(1), Value::from(2)]),
                "nothing" => Response::Params(vec![]),
                _ => Response::Fault(Fault::new(4, "method not found")),
            }
        }
    }

    impl Transport for Server {
        fn submit(&self, request: HttpRequest) -> BoxFuture<'static, Reply> {
            let call = Request::from_xml(&request.body).unwrap();
            self.seen.lock().unwrap().push(request);
            future::ready(Ok(answer(Server::dispatch(&call)))).boxed()
        }
    }

    /// Every exchange waits until the test completes it by hand.
    #[derive(Default, Clone)]
    struct Manual {
        pending: Arc<Mutex<Vec<oneshot::Sender<Reply>>>>,
    }

    impl Manual {
        fn complete(&self, idx: usize, reply: Reply) {
            let sender = self.pending.lock().unwrap().remove(idx);
            sender.send(reply).unwrap();
        }

        fn len(&self) -> usize {
            self.pending.lock().unwrap().len()
        }
    }

    impl Transport for Manual {
        fn submit(&self, _request: HttpRequest) -> BoxFuture<'static, Reply> {
            let (tx, rx) = oneshot::channel();
            self.pending.lock().unwrap().push(tx);
            async move { rx.await.unwrap() }.boxed()
        }
    }

    struct Refused;

    impl Transport for Refused {
        fn submit(&self, _request: HttpRequest) -> BoxFuture<'static, Reply> {
            let err = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
            future::ready(Err(err.into())).boxed()
        }
    }

    fn server_client() -> (Client, Arc<Mutex<Vec<HttpRequest>>>) {
        let server = Server::default();
        let seen = server.seen.clone();
        let client = Client::with_transport("http://localhost:8000", ClientConfig::default(), server).unwrap();
        (client, seen)
    }

    #[tokio::test]
    async fn test_call_unwraps_single_value() {
        let (client, _) = server_client();

        let result = client.call("add", vec![Value::from(1), Value::from(2)]).await.unwrap();
        assert_eq!(Value::Int(3), result);
    }

    #[tokio::test]
    async fn test_request_delivers_result_to_callback() {
        let (client, _) = server_client();
        let (tx, rx) = oneshot::channel();

        client
            .request("add", move |result| tx.send(result).unwrap(), vec![Value::from(1), Value::from(2)])
            .unwrap();

        assert_eq!(Value::Int(3), rx.await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_dotted_proxy_call() {
        let (client, seen) = server_client();
        let (tx, rx) = oneshot::channel();

        client
            .method("system")
            .attr("listMethods")
            .call(move |result| tx.send(result).unwrap(), vec![])
            .unwrap();

        let result = rx.await.unwrap().unwrap();
        assert_eq!(Value::from(vec!["add", "system.listMethods"]), result);

        let body = seen.lock().unwrap()[0].body.clone();
        assert_eq!("system.listMethods", Request::from_xml(&body).unwrap().method);
    }

    #[tokio::test]
    async fn test_fault_reaches_callback() {
        let (client, _) = server_client();
        let (tx, rx) = oneshot::channel();

        client.request("missing", move |result| tx.send(result).unwrap(), vec![]).unwrap();

        match rx.await.unwrap() {
            Err(Error::Fault(fault)) => assert_eq!(Fault::new(4, "method not found"), fault),
            other => panic!("expected a fault, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_values_pass_through() {
        let (client, _) = server_client();

        assert_eq!(
            Value::from(vec![1, 2]),
            client.call("pair", vec![]).await.unwrap()
        );
        assert_eq!(Value::Array(vec![]), client.call("nothing", vec![]).await.unwrap());
    }

    #[tokio::test]
    async fn test_request_headers() {
        let config = ClientConfig::default().user_agent("calc-client/0.3");
        let server = Server::default();
        let seen = server.seen.clone();
        let client = Client::with_transport("https://rpc.example.org/xmlrpc/", config, server).unwrap();

        client.call("add", vec![Value::from("é")]).await.unwrap();

        let request = seen.lock().unwrap().remove(0);
        assert_eq!("https://rpc.example.org/xmlrpc/", request.uri);
        assert_eq!(Duration::from_secs(60), request.timeout);
        assert_eq!("text/xml", request.headers[CONTENT_TYPE].to_str().unwrap());
        assert_eq!("calc-client/0.3", request.headers["user-agent"].to_str().unwrap());
        // bytes, not characters
        assert_eq!(
            request.body.len().to_string(),
            request.headers[CONTENT_LENGTH].to_str().unwrap()
        );
    }

    #[tokio::test]
    async fn test_encoding_error_is_synchronous() {
        let (client, seen) = server_client();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let result = client.request(
            "add",
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            vec![Value::Nil],
        );

        assert!(matches!(result, Err(Error::Encoding(EncodingError::NilNotAllowed))));
        tokio::task::yield_now().await;
        assert_eq!(0, fired.load(Ordering::SeqCst));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_allow_none() {
        let server = Server::default();
        let seen = server.seen.clone();
        let client = Client::with_transport(
            "http://localhost/",
            ClientConfig::default().allow_none(true),
            server,
        )
        .unwrap();

        client.call("add", vec![Value::Nil, Value::from(2)]).await.unwrap();

        let body = seen.lock().unwrap()[0].body.clone();
        assert_eq!(
            vec![Value::Nil, Value::Int(2)],
            Request::from_xml(&body).unwrap().params
        );
    }

    #[test]
    fn test_request_outside_runtime() {
        let (client, seen) = server_client();

        let result = client.request("add", |_| {}, vec![]);

        assert!(matches!(result, Err(Error::Runtime(_))));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_returns_before_callback() {
        let transport = Manual::default();
        let client = Client::with_transport("http://localhost/", ClientConfig::default(), transport.clone()).unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let (tx, rx) = oneshot::channel();

        client
            .request(
                "add",
                move |result| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tx.send(result).unwrap();
                },
                vec![Value::from(1), Value::from(2)],
            )
            .unwrap();

        // submitted, not completed
        assert_eq!(1, transport.len());
        tokio::task::yield_now().await;
        assert_eq!(0, fired.load(Ordering::SeqCst));

        transport.complete(0, Ok(answer(Response::Params(vec![Value::from(3)]))));

        assert_eq!(Value::Int(3), rx.await.unwrap().unwrap());
        tokio::task::yield_now().await;
        assert_eq!(1, fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_independent() {
        let transport = Manual::default();
        let client = Client::with_transport("http://localhost/", ClientConfig::default(), transport.clone()).unwrap();
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();

        client
            .request("first", move |result| first_tx.send(result).unwrap(), vec![])
            .unwrap();
        client
            .request("second", move |result| second_tx.send(result).unwrap(), vec![])
            .unwrap();
        assert_eq!(2, transport.len());

        // complete in reverse order
        transport.complete(1, Ok(answer(Response::Params(vec![Value::from("second")]))));
        assert_eq!(Value::from("second"), second_rx.await.unwrap().unwrap());

        transport.complete(0, Ok(answer(Response::Params(vec![Value::from("first")]))));
        assert_eq!(Value::from("first"), first_rx.await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_http_error_status_is_not_parsed() {
        let transport = Manual::default();
        let client = Client::with_transport("http://localhost/", ClientConfig::default(), transport.clone()).unwrap();
        let (tx, rx) = oneshot::channel();

        client.request("add", move |result| tx.send(result).unwrap(), vec![]).unwrap();

        // a well-formed fault body behind a 500 is still a transport failure
        let mut response = answer(Response::Fault(Fault::new(1, "boom")));
        response.status = StatusCode::INTERNAL_SERVER_ERROR;
        transport.complete(0, Ok(response));

        match rx.await.unwrap() {
            Err(Error::Transport(TransportError::Status { url, code, reason })) => {
                assert_eq!("http://localhost/", url);
                assert_eq!(500, code);
                assert_eq!("Internal Server Error", reason);
            }
            other => panic!("expected a status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_reaches_callback() {
        let client = Client::with_transport("http://localhost/", ClientConfig::default(), Refused).unwrap();
        let (tx, rx) = oneshot::channel();

        client.request("add", move |result| tx.send(result).unwrap(), vec![]).unwrap();

        match rx.await.unwrap() {
            Err(Error::Transport(TransportError::Io(err))) => {
                assert_eq!(io::ErrorKind::ConnectionRefused, err.kind())
            }
            other => panic!("expected a transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_response_reaches_callback() {
        let transport = Manual::default();
        let client = Client::with_transport("http://localhost/", ClientConfig::default(), transport.clone()).unwrap();
        let (tx, rx) = oneshot::channel();

        client.request("add", move |result| tx.send(result).unwrap(), vec![]).unwrap();
        transport.complete(0, Ok(ok("<html>gateway says hi</html>")));

        assert!(matches!(rx.await.unwrap(), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_parse() {
        let body = Response::Params(vec![Value::from(3)]).to_xml(false).unwrap();
        assert_eq!(Value::Int(3), Client::parse(body.as_bytes()).unwrap());

        let body = Response::Fault(Fault::new(4, "method not found")).to_xml(false).unwrap();
        assert!(matches!(
            Client::parse(body.as_bytes()),
            Err(Error::Fault(ref fault)) if fault.code == 4
        ));

        assert!(matches!(Client::parse(b"not xml"), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_deeply_nested_response() {
        let mut body = "<methodResponse><params><param><value>".to_string();
        body.push_str(&"<array><data><value>".repeat(10_000));
        body.push_str("<int>1</int>");
        body.push_str(&"</value></data></array>".repeat(10_000));
        body.push_str("</value></param></params></methodResponse>");

        assert!(matches!(
            Client::parse(body.as_bytes()),
            Err(Error::MalformedResponse(ParseError::TooDeep(_)))
        ));
    }

    #[test]
    fn test_parse_zoned_timestamps() {
        for text in &["20240101T00:00:00Z", "2024-01-01T00:00:00", "20240101T00:00:00+0000"] {
            let body = format!(
                "<methodResponse><params><param><value>\
                 <dateTime.iso8601>{}</dateTime.iso8601>\
                 </value></param></params></methodResponse>",
                text
            );
            assert_eq!(
                Value::DateTime(datetime!(2024-01-01 0:00)),
                Client::parse(body.as_bytes()).unwrap(),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_unsupported_protocol_at_construction() {
        assert!(matches!(
            Client::new("ftp://example.com/"),
            Err(Error::UnsupportedProtocol(_))
        ));
    }
}
