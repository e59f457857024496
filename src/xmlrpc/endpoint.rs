// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Path used when the URI names none, as XML-RPC servers conventionally expect.
pub const DEFAULT_PATH: &str = "/RPC2";

static SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^/:]+):(.*)$").unwrap());
static AUTHORITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^//([^/?#]*)(.*)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// Where calls are posted. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    path: String,
    uri: String,
}

impl Endpoint {
    pub fn parse(uri: &str) -> Result<Endpoint> {
        let unsupported = || Error::UnsupportedProtocol(uri.to_string());

        let caps = SCHEME.captures(uri).ok_or_else(unsupported)?;
        let scheme = match caps[1].to_ascii_lowercase().as_str() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            _ => return Err(unsupported()),
        };

        let rest = caps.get(2).map_or("", |m| m.as_str());
        let caps = AUTHORITY
            .captures(rest)
            .ok_or_else(|| Error::InvalidUri(uri.to_string()))?;
        let host = caps[1].to_string();
        if host.is_empty() {
            return Err(Error::InvalidUri(uri.to_string()));
        }

        let path = match &caps[2] {
            "" => DEFAULT_PATH.to_string(),
            path => path.to_string(),
        };

        let uri = format!("{}://{}{}", scheme.as_str(), host, path);
        trace!("Parsed XML-RPC endpoint: {}", uri);

        Ok(Endpoint {
            scheme,
            host,
            path,
            uri,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Endpoint> {
        Endpoint::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::{Endpoint, Scheme};
    use crate::error::Error;

    #[test]
    fn test_parse_with_path() {
        let endpoint = Endpoint::parse("https://rpc.example.org/xmlrpc/").unwrap();

        assert_eq!(Scheme::Https, endpoint.scheme());
        assert_eq!("rpc.example.org", endpoint.host());
        assert_eq!("/xmlrpc/", endpoint.path());
        assert_eq!("https://rpc.example.org/xmlrpc/", endpoint.uri());
    }

    #[test]
    fn test_default_path() {
        let endpoint = Endpoint::parse("http://localhost:8000").unwrap();

        assert_eq!("localhost:8000", endpoint.host());
        assert_eq!("/RPC2", endpoint.path());
        assert_eq!("http://localhost:8000/RPC2", endpoint.to_string());
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let endpoint: Endpoint = "HTTP://example.com/api?token=1".parse().unwrap();

        assert_eq!(Scheme::Http, endpoint.scheme());
        assert_eq!("/api?token=1", endpoint.path());
        assert_eq!("http://example.com/api?token=1", endpoint.uri());
    }

    #[test]
    fn test_unsupported_protocols() {
        for uri in &["ftp://example.com/RPC2", "example.com/RPC2", "", "file:///etc/hosts"] {
            match Endpoint::parse(uri) {
                Err(Error::UnsupportedProtocol(ref offending)) => assert_eq!(uri, offending),
                other => panic!("{:?} parsed as {:?}", uri, other),
            }
        }
    }

    #[test]
    fn test_missing_host() {
        assert!(matches!(Endpoint::parse("http:/RPC2"), Err(Error::InvalidUri(_))));
        assert!(matches!(Endpoint::parse("https:///RPC2"), Err(Error::InvalidUri(_))));
    }
}
