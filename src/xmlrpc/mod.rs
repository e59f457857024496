// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

#![forbid(non_camel_case_types)]

//! XML-RPC library, including both serialization and remote procedure calling
//!
//! # What is XML-RPC?
//!
//! A remote procedure call protocol: a call is an XML `methodCall` document
//! POSTed over HTTP, and the answer is a `methodResponse` document carrying
//! either one return value or a `fault`.
//!
//! Basic documentation found on Wikipedia
//! http://en.wikipedia.org/wiki/XML-RPC
//!
//! Full specification of the XML-RPC protocol is found here:
//! http://xmlrpc.scripting.com/spec.html
//!
//! Additional errata and hints can be found here:
//! http://effbot.org/zone/xmlrpc-errata.htm
//!

pub mod client;
pub mod encoding;
pub mod endpoint;
pub mod protocol;
pub mod proxy;
pub mod transport;
pub mod value;
