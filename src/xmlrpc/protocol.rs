// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::collections::BTreeMap;
use std::fmt;

use crate::xmlrpc::encoding::{BuildResult, Builder, EncodingError, Encoder, ParseError, Token};
use crate::xmlrpc::value::Value;

const XML_DECLARATION: &str = "<?xml version=\"1.0\"?>";

/// A method call: the method name and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub params: Vec<Value>,
}

/// The decoded `methodResponse`.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Params(Vec<Value>),
    Fault(Fault),
}

/// An application-level error reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: i32,
    pub message: String,
}

impl Request {
    pub fn new(method: &str) -> Request {
        Request {
            method: method.to_string(),
            params: Vec::new(),
        }
    }

    pub fn argument<T: Into<Value>>(mut self, object: T) -> Request {
        self.params.push(object.into());
        self
    }

    /// Serializes the `methodCall` envelope.
    pub fn to_xml(&self, allow_none: bool) -> Result<String, EncodingError> {
        encode_call(&self.method, &self.params, allow_none)
    }

    /// Parses a `methodCall` envelope.
    pub fn from_xml(body: &[u8]) -> Result<Request, ParseError> {
        decode_call(body)
    }
}

/// Shortcut function to encode a `methodCall` document
pub fn encode_call(method: &str, params: &[Value], allow_none: bool) -> Result<String, EncodingError> {
    let mut body = String::new();
    {
        let mut encoder = Encoder::new(&mut body, allow_none);
        encoder.emit_raw(XML_DECLARATION)?;
        encoder.emit_raw("<methodCall><methodName>")?;
        encoder.emit_text(method)?;
        encoder.emit_raw("</methodName><params>")?;
        for param in params {
            encoder.emit_raw("<param>")?;
            encoder.emit_value(param)?;
            encoder.emit_raw("</param>")?;
        }
        encoder.emit_raw("</params></methodCall>")?;
    }
    Ok(body)
}

/// Shortcut function to decode a `methodCall` document
pub fn decode_call(body: &[u8]) -> Result<Request, ParseError> {
    let mut builder = Builder::new(body);
    builder.expect_start("methodCall")?;
    builder.expect_start("methodName")?;
    let method = builder.read_text("methodName")?.trim().to_string();

    let params = match builder.next_tag()? {
        Token::Start(ref name) if name == "params" => {
            let params = build_params(&mut builder)?;
            builder.expect_end("methodCall")?;
            params
        }
        Token::End(ref name) if name == "methodCall" => Vec::new(),
        token => {
            return Err(ParseError::Unexpected {
                expected: "<params>".to_string(),
                found: token.to_string(),
            })
        }
    };
    builder.expect_end_document()?;

    Ok(Request { method, params })
}

/// Reads `<param><value>..</value></param>` entries up to `</params>`.
fn build_params<R: std::io::Read>(builder: &mut Builder<R>) -> BuildResult<Vec<Value>> {
    let mut params = Vec::new();
    loop {
        match builder.next_tag()? {
            Token::End(ref name) if name == "params" => return Ok(params),
            Token::Start(ref name) if name == "param" => {
                builder.expect_start("value")?;
                params.push(builder.build_value()?);
                builder.expect_end("param")?;
            }
            token => {
                return Err(ParseError::Unexpected {
                    expected: "<param>".to_string(),
                    found: token.to_string(),
                })
            }
        }
    }
}

impl Response {
    /// Parses a `methodResponse` envelope.
    pub fn from_xml(body: &[u8]) -> Result<Response, ParseError> {
        decode_response(body)
    }

    /// Serializes the `methodResponse` envelope, the way a server answers.
    pub fn to_xml(&self, allow_none: bool) -> Result<String, EncodingError> {
        match self {
            Response::Params(params) => encode_response(params, allow_none),
            Response::Fault(fault) => encode_fault(fault),
        }
    }
}

/// Shortcut function to decode a `methodResponse` document
pub fn decode_response(body: &[u8]) -> Result<Response, ParseError> {
    let mut builder = Builder::new(body);
    builder.expect_start("methodResponse")?;

    let response = match builder.next_tag()? {
        Token::Start(ref name) if name == "params" => Response::Params(build_params(&mut builder)?),
        Token::Start(ref name) if name == "fault" => {
            builder.expect_start("value")?;
            let fault = Fault::from_value(&builder.build_value()?)?;
            builder.expect_end("fault")?;
            Response::Fault(fault)
        }
        token => {
            return Err(ParseError::Unexpected {
                expected: "<params> or <fault>".to_string(),
                found: token.to_string(),
            })
        }
    };

    builder.expect_end("methodResponse")?;
    builder.expect_end_document()?;
    Ok(response)
}

/// Shortcut function to encode a `methodResponse` carrying `params`
pub fn encode_response(params: &[Value], allow_none: bool) -> Result<String, EncodingError> {
    let mut body = String::new();
    {
        let mut encoder = Encoder::new(&mut body, allow_none);
        encoder.emit_raw(XML_DECLARATION)?;
        encoder.emit_raw("<methodResponse><params>")?;
        for param in params {
            encoder.emit_raw("<param>")?;
            encoder.emit_value(param)?;
            encoder.emit_raw("</param>")?;
        }
        encoder.emit_raw("</params></methodResponse>")?;
    }
    Ok(body)
}

/// Shortcut function to encode a `methodResponse` carrying a fault
pub fn encode_fault(fault: &Fault) -> Result<String, EncodingError> {
    let mut body = String::new();
    {
        let mut encoder = Encoder::new(&mut body, false);
        encoder.emit_raw(XML_DECLARATION)?;
        encoder.emit_raw("<methodResponse><fault>")?;
        encoder.emit_value(&fault.to_value())?;
        encoder.emit_raw("</fault></methodResponse>")?;
    }
    Ok(body)
}

impl Fault {
    pub fn new(code: i32, message: &str) -> Fault {
        Fault {
            code,
            message: message.to_string(),
        }
    }

    /// Reads the `{faultCode, faultString}` struct carried in a `<fault>`.
    pub fn from_value(value: &Value) -> Result<Fault, ParseError> {
        let code = value
            .get("faultCode")
            .and_then(Value::as_i32)
            .ok_or(ParseError::MalformedFault("faultCode"))?;
        let message = value
            .get("faultString")
            .and_then(Value::as_str)
            .ok_or(ParseError::MalformedFault("faultString"))?;
        Ok(Fault::new(code, message))
    }

    pub fn to_value(&self) -> Value {
        let mut members = BTreeMap::new();
        members.insert("faultCode".to_string(), Value::from(self.code));
        members.insert("faultString".to_string(), Value::from(self.message.as_str()));
        Value::Struct(members)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<Fault {}: {:?}>", self.code, self.message)
    }
}

impl std::error::Error for Fault {}
