// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::io::Read;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{PrimitiveDateTime, UtcOffset};
use xml::escape::escape_str_pcdata;
use xml::reader::{self, EventReader, ParserConfig};

use crate::xmlrpc::value::Value;

/// `dateTime.iso8601` as XML-RPC actually uses it: no separators in the
/// date, no timezone.
pub const DATETIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day]T[hour]:[minute]:[second]");

const DATETIME_DASHED: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const OFFSET_COMPACT: &[FormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory][offset_minute]");
const OFFSET_COLON: &[FormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

/// Deepest nesting of arrays and structs the builder accepts.
pub const MAX_DEPTH: usize = 128;

/// The errors that can arise while turning values into an XML-RPC document.
#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("cannot marshal nil unless allow_none is enabled")]
    NilNotAllowed,
    #[error("int {0} exceeds XML-RPC limits")]
    IntOutOfRange(i64),
    #[error("double {0} cannot be represented in XML-RPC")]
    NonFiniteDouble(f64),
    #[error("character {0:?} is not allowed in an XML document")]
    InvalidChar(char),
    #[error("cannot format datetime: {0}")]
    DateTime(#[from] time::error::Format),
    #[error("formatter error")]
    Fmt(#[from] fmt::Error),
}

/// The errors that can arise while parsing an XML-RPC document.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("xml syntax error: {0}")]
    Syntax(#[from] reader::Error),
    #[error("expected {expected}, found {found}")]
    Unexpected { expected: String, found: String },
    #[error("invalid {kind} value {text:?}")]
    InvalidValue { kind: &'static str, text: String },
    #[error("unknown value type <{0}>")]
    UnknownType(String),
    #[error("fault struct is missing a valid {0}")]
    MalformedFault(&'static str),
    #[error("values nested deeper than {0} levels")]
    TooDeep(usize),
}

pub type EncodeResult = Result<(), EncodingError>;
pub type BuildResult<T> = Result<T, ParseError>;

/// Reads a `dateTime.iso8601` timestamp, compact or dashed, with an optional
/// `Z` or `+HHMM`/`+HH:MM` suffix. Zoned times are shifted to UTC.
pub fn parse_datetime(text: &str) -> Option<PrimitiveDateTime> {
    let (local, offset) = split_offset(text)?;
    let datetime = PrimitiveDateTime::parse(local, DATETIME_FORMAT)
        .or_else(|_| PrimitiveDateTime::parse(local, DATETIME_DASHED))
        .ok()?;
    let utc = datetime.assume_offset(offset).to_offset(UtcOffset::UTC);
    Some(PrimitiveDateTime::new(utc.date(), utc.time()))
}

fn split_offset(text: &str) -> Option<(&str, UtcOffset)> {
    if let Some(local) = text.strip_suffix('Z') {
        return Some((local, UtcOffset::UTC));
    }
    // a sign after the time separator starts the offset
    let time_start = text.find('T')?;
    match text.rfind(|c: char| c == '+' || c == '-') {
        Some(pos) if pos > time_start => {
            let suffix = &text[pos..];
            let offset = UtcOffset::parse(suffix, OFFSET_COMPACT)
                .or_else(|_| UtcOffset::parse(suffix, OFFSET_COLON))
                .ok()?;
            Some((&text[..pos], offset))
        }
        _ => Some((text, UtcOffset::UTC)),
    }
}

/// XML 1.0 `Char` production.
fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// A structure for implementing serialization to XML-RPC.
pub struct Encoder<'a> {
    writer: &'a mut dyn Write,
    allow_none: bool,
}

impl<'a> Encoder<'a> {
    /// Creates a new XML-RPC encoder whose output will be written to the writer
    /// specified.
    pub fn new(writer: &'a mut dyn Write, allow_none: bool) -> Encoder<'a> {
        Encoder { writer, allow_none }
    }

    /// Writes markup as-is.
    pub fn emit_raw(&mut self, markup: &str) -> EncodeResult {
        self.writer.write_str(markup)?;
        Ok(())
    }

    /// Writes character data, escaped.
    pub fn emit_text(&mut self, v: &str) -> EncodeResult {
        if let Some(c) = v.chars().find(|c| !is_xml_char(*c)) {
            return Err(EncodingError::InvalidChar(c));
        }
        self.writer.write_str(&escape_str_pcdata(v))?;
        Ok(())
    }

    /// Writes `<value>...</value>`.
    pub fn emit_value(&mut self, value: &Value) -> EncodeResult {
        self.writer.write_str("<value>")?;
        match value {
            Value::Int(v) => self.emit_int(*v)?,
            Value::Double(v) => self.emit_double(*v)?,
            Value::Boolean(v) => write!(self.writer, "<boolean>{}</boolean>", *v as u8)?,
            Value::String(v) => {
                self.writer.write_str("<string>")?;
                self.emit_text(v)?;
                self.writer.write_str("</string>")?;
            }
            Value::Base64(v) => write!(self.writer, "<base64>{}</base64>", BASE64.encode(v))?,
            Value::DateTime(v) => write!(
                self.writer,
                "<dateTime.iso8601>{}</dateTime.iso8601>",
                v.format(DATETIME_FORMAT)?
            )?,
            Value::Array(items) => {
                self.writer.write_str("<array><data>")?;
                for item in items {
                    self.emit_value(item)?;
                }
                self.writer.write_str("</data></array>")?;
            }
            Value::Struct(members) => {
                self.writer.write_str("<struct>")?;
                for (name, member) in members {
                    self.writer.write_str("<member><name>")?;
                    self.emit_text(name)?;
                    self.writer.write_str("</name>")?;
                    self.emit_value(member)?;
                    self.writer.write_str("</member>")?;
                }
                self.writer.write_str("</struct>")?;
            }
            Value::Nil => {
                if !self.allow_none {
                    return Err(EncodingError::NilNotAllowed);
                }
                self.writer.write_str("<nil/>")?;
            }
        }
        self.writer.write_str("</value>")?;
        Ok(())
    }

    fn emit_int(&mut self, v: i64) -> EncodeResult {
        // XML-RPC only supports 4-byte signed integer
        let v: i32 = num::cast(v).ok_or(EncodingError::IntOutOfRange(v))?;
        write!(self.writer, "<int>{}</int>", v)?;
        Ok(())
    }

    fn emit_double(&mut self, v: f64) -> EncodeResult {
        if !v.is_finite() {
            return Err(EncodingError::NonFiniteDouble(v));
        }
        // Debug keeps the decimal point on whole numbers
        write!(self.writer, "<double>{:?}</double>", v)?;
        Ok(())
    }
}

/// Shortcut function to encode a single value into an XML `String`
pub fn encode(value: &Value, allow_none: bool) -> Result<String, EncodingError> {
    let mut s = String::new();
    Encoder::new(&mut s, allow_none).emit_value(value)?;
    Ok(s)
}

/// A token of the XML-RPC document, as seen by the builder.
#[derive(PartialEq, Clone, Debug)]
pub enum Token {
    Start(String),
    End(String),
    Text(String),
    EndDocument,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Start(name) => write!(f, "<{}>", name),
            Token::End(name) => write!(f, "</{}>", name),
            Token::Text(text) => write!(f, "text {:?}", text),
            Token::EndDocument => f.write_str("end of document"),
        }
    }
}

fn unexpected(expected: impl Into<String>, found: &Token) -> ParseError {
    ParseError::Unexpected {
        expected: expected.into(),
        found: found.to_string(),
    }
}

fn invalid(kind: &'static str, text: &str) -> ParseError {
    ParseError::InvalidValue {
        kind,
        text: text.to_string(),
    }
}

/// Pull parser over an XML-RPC document, building `Value` trees out of it.
pub struct Builder<R: Read> {
    parser: EventReader<R>,
    depth: usize,
}

impl<R: Read> Builder<R> {
    /// Create an XML Builder.
    pub fn new(src: R) -> Builder<R> {
        let config = ParserConfig::new()
            .cdata_to_characters(true)
            .ignore_comments(true)
            .coalesce_characters(true);
        Builder {
            parser: config.create_reader(src),
            depth: 0,
        }
    }

    /// Next token of interest; comments, processing instructions and the
    /// prolog are dropped.
    pub fn next_token(&mut self) -> BuildResult<Token> {
        loop {
            let token = match self.parser.next()? {
                reader::XmlEvent::StartElement { name, .. } => Token::Start(name.local_name),
                reader::XmlEvent::EndElement { name } => Token::End(name.local_name),
                reader::XmlEvent::Characters(s) | reader::XmlEvent::Whitespace(s) => Token::Text(s),
                reader::XmlEvent::EndDocument => Token::EndDocument,
                _ => continue,
            };
            return Ok(token);
        }
    }

    /// Next structural token; whitespace between elements is skipped, any
    /// other text is an error.
    pub fn next_tag(&mut self) -> BuildResult<Token> {
        loop {
            match self.next_token()? {
                Token::Text(ref s) if s.trim().is_empty() => continue,
                token @ Token::Text(_) => return Err(unexpected("an element", &token)),
                token => return Ok(token),
            }
        }
    }

    pub fn expect_start(&mut self, name: &str) -> BuildResult<()> {
        match self.next_tag()? {
            Token::Start(ref found) if found == name => Ok(()),
            token => Err(unexpected(format!("<{}>", name), &token)),
        }
    }

    pub fn expect_end(&mut self, name: &str) -> BuildResult<()> {
        match self.next_tag()? {
            Token::End(ref found) if found == name => Ok(()),
            token => Err(unexpected(format!("</{}>", name), &token)),
        }
    }

    pub fn expect_end_document(&mut self) -> BuildResult<()> {
        match self.next_tag()? {
            Token::EndDocument => Ok(()),
            token => Err(unexpected("end of document", &token)),
        }
    }

    /// Collects character data up to the closing `</name>`.
    pub fn read_text(&mut self, name: &str) -> BuildResult<String> {
        let mut text = String::new();
        loop {
            match self.next_token()? {
                Token::Text(s) => text.push_str(&s),
                Token::End(ref found) if found == name => return Ok(text),
                token => return Err(unexpected(format!("</{}>", name), &token)),
            }
        }
    }

    /// Builds the content of a `<value>` whose start tag has been consumed,
    /// up to and including `</value>`.
    pub fn build_value(&mut self) -> BuildResult<Value> {
        let mut text = String::new();
        loop {
            match self.next_token()? {
                Token::Text(s) => text.push_str(&s),
                // untyped values are strings
                Token::End(ref name) if name == "value" => return Ok(Value::String(text)),
                Token::Start(name) => {
                    if !text.trim().is_empty() {
                        return Err(unexpected("a typed value", &Token::Text(text)));
                    }
                    let value = self.build_typed(&name)?;
                    self.expect_end("value")?;
                    return Ok(value);
                }
                token => return Err(unexpected("</value>", &token)),
            }
        }
    }

    fn build_typed(&mut self, name: &str) -> BuildResult<Value> {
        match name {
            "int" | "i4" | "i8" => self.build_int(name),
            "boolean" => self.build_boolean(),
            "string" => Ok(Value::String(self.read_text(name)?)),
            "double" => self.build_double(),
            "dateTime.iso8601" => self.build_datetime(),
            "base64" => self.build_base64(),
            "nil" => self.build_nil(),
            "struct" | "array" => {
                if self.depth >= MAX_DEPTH {
                    return Err(ParseError::TooDeep(MAX_DEPTH));
                }
                self.depth += 1;
                let value = if name == "struct" {
                    self.build_struct()
                } else {
                    self.build_array()
                };
                self.depth -= 1;
                value
            }
            _ => Err(ParseError::UnknownType(name.to_string())),
        }
    }

    fn build_int(&mut self, name: &str) -> BuildResult<Value> {
        let text = self.read_text(name)?;
        text.trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| invalid("int", &text))
    }

    fn build_boolean(&mut self) -> BuildResult<Value> {
        let text = self.read_text("boolean")?;
        match text.trim() {
            "0" => Ok(Value::Boolean(false)),
            "1" => Ok(Value::Boolean(true)),
            _ => Err(invalid("boolean", &text)),
        }
    }

    fn build_double(&mut self) -> BuildResult<Value> {
        let text = self.read_text("double")?;
        text.trim()
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| invalid("double", &text))
    }

    fn build_datetime(&mut self) -> BuildResult<Value> {
        let text = self.read_text("dateTime.iso8601")?;
        match parse_datetime(text.trim()) {
            Some(datetime) => Ok(Value::DateTime(datetime)),
            None => {
                // keep timestamps we cannot read as the server sent them
                debug!("Keeping unrecognized dateTime.iso8601 {:?} as a string", text);
                Ok(Value::String(text))
            }
        }
    }

    fn build_base64(&mut self) -> BuildResult<Value> {
        let text = self.read_text("base64")?;
        let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        BASE64
            .decode(compact.as_bytes())
            .map(Value::Base64)
            .map_err(|_| invalid("base64", &text))
    }

    fn build_nil(&mut self) -> BuildResult<Value> {
        match self.next_tag()? {
            Token::End(ref name) if name == "nil" => Ok(Value::Nil),
            token => Err(unexpected("</nil>", &token)),
        }
    }

    fn build_struct(&mut self) -> BuildResult<Value> {
        let mut members = BTreeMap::new();
        loop {
            match self.next_tag()? {
                Token::End(ref name) if name == "struct" => return Ok(Value::Struct(members)),
                Token::Start(ref name) if name == "member" => {
                    self.expect_start("name")?;
                    let key = self.read_text("name")?;
                    self.expect_start("value")?;
                    let value = self.build_value()?;
                    self.expect_end("member")?;
                    members.insert(key, value);
                }
                token => return Err(unexpected("<member>", &token)),
            }
        }
    }

    fn build_array(&mut self) -> BuildResult<Value> {
        self.expect_start("data")?;
        let mut values = Vec::new();
        loop {
            match self.next_tag()? {
                Token::End(ref name) if name == "data" => break,
                Token::Start(ref name) if name == "value" => values.push(self.build_value()?),
                token => return Err(unexpected("<value>", &token)),
            }
        }
        self.expect_end("array")?;
        Ok(Value::Array(values))
    }
}

/// Shortcut function to build a single `<value>` document into a `Value`
pub fn decode(s: &str) -> BuildResult<Value> {
    let mut builder = Builder::new(s.as_bytes());
    builder.expect_start("value")?;
    let value = builder.build_value()?;
    builder.expect_end_document()?;
    Ok(value)
}
