// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use crate::error::Result;
use crate::xmlrpc::client::Client;
use crate::xmlrpc::value::Value;

/// A remote method name being built up, segment by segment.
///
/// `client.method("domain").attr("zone").attr("list")` names
/// `domain.zone.list`. Names are not checked locally; a server that does
/// not know one answers with a fault.
#[derive(Clone)]
pub struct MethodProxy<'a> {
    client: &'a Client,
    segments: Vec<String>,
}

impl<'a> MethodProxy<'a> {
    pub fn new(client: &'a Client, name: &str) -> MethodProxy<'a> {
        MethodProxy {
            client,
            segments: vec![name.to_string()],
        }
    }

    /// A proxy with no name yet; the first `attr` names the method.
    pub fn root(client: &'a Client) -> MethodProxy<'a> {
        MethodProxy {
            client,
            segments: Vec::new(),
        }
    }

    /// A new proxy for `<name>.<segment>`, or just `segment` on a root proxy.
    pub fn attr(&self, segment: &str) -> MethodProxy<'a> {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        MethodProxy {
            client: self.client,
            segments,
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn name(&self) -> String {
        self.segments.join(".")
    }

    /// Forwards to [`Client::request`].
    pub fn call<F>(&self, callback: F, params: Vec<Value>) -> Result<()>
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        self.client.request(&self.name(), callback, params)
    }

    /// Forwards to [`Client::call`].
    pub async fn invoke(&self, params: Vec<Value>) -> Result<Value> {
        self.client.call(&self.name(), params).await
    }
}
