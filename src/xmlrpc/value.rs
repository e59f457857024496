// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use time::PrimitiveDateTime;

/// Represents an XML-RPC data value
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    /// `<int>` / `<i4>`, and the `<i8>` extension on the way in. Only values
    /// fitting in 32 bits can be sent.
    Int(i64),
    Double(f64),
    Boolean(bool),
    String(String),
    Base64(Vec<u8>),
    DateTime(PrimitiveDateTime),
    Array(Array),
    Struct(Members),
    /// `<nil/>`, an extension most servers accept. Refused by the encoder
    /// unless explicitly allowed.
    Nil,
}

pub type Array = Vec<Value>;
pub type Members = BTreeMap<String, Value>;

impl Value {
    /// If the value is a Struct, returns the value associated with the provided key.
    /// Otherwise, returns None.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.get(key),
            _ => None,
        }
    }

    /// Attempts to get a nested Struct for each key in `keys`.
    /// If any key is found not to exist, find_path will return None.
    /// Otherwise, it will return the value associated with the final key.
    pub fn find_path(&self, keys: &[&str]) -> Option<&Value> {
        let mut target = self;
        for key in keys {
            target = target.get(key)?;
        }
        Some(target)
    }

    /// If the value is a Struct, performs a depth-first search until a value
    /// associated with the provided key is found.
    pub fn search(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members
                .get(key)
                .or_else(|| members.values().find_map(|v| v.search(key))),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Members> {
        match self {
            Value::Struct(members) => Some(members),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the integer if it fits in an XML-RPC `<int>`.
    pub fn as_i32(&self) -> Option<i32> {
        self.as_i64().and_then(num::cast)
    }

    /// If the value is a number, return or cast it to a f64.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(n) => num::cast(n),
            Value::Double(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Base64(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<PrimitiveDateTime> {
        match *self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Name of the wire element this value is carried in.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Base64(_) => "base64",
            Value::DateTime(_) => "dateTime.iso8601",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
            Value::Nil => "nil",
        }
    }
}

macro_rules! from_int_impl {
    ($($t:ty),+) => (
        $(impl From<$t> for Value {
            fn from(v: $t) -> Value { Value::Int(v as i64) }
        })+
    )
}

from_int_impl! { i8, i16, i32, i64, u8, u16, u32 }

impl From<f32> for Value {
    fn from(v: f32) -> Value {
        Value::Double(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::String(v)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Value {
        Value::Nil
    }
}

impl From<PrimitiveDateTime> for Value {
    fn from(v: PrimitiveDateTime) -> Value {
        Value::DateTime(v)
    }
}

impl<A: Into<Value>> From<Vec<A>> for Value {
    fn from(v: Vec<A>) -> Value {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<A: Into<Value>> From<BTreeMap<String, A>> for Value {
    fn from(v: BTreeMap<String, A>) -> Value {
        Value::Struct(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<A: Into<Value>> From<HashMap<String, A>> for Value {
    fn from(v: HashMap<String, A>) -> Value {
        Value::Struct(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<A: Into<Value>> From<Option<A>> for Value {
    fn from(v: Option<A>) -> Value {
        match v {
            None => Value::Nil,
            Some(value) => value.into(),
        }
    }
}

macro_rules! tuple_impl {
    // use variables to indicate the arity of the tuple
    ($($tyvar:ident),* ) => {
        impl<$( $tyvar : Into<Value> ),*> From<( $( $tyvar ),* , )> for Value {
            #[inline]
            #[allow(non_snake_case)]
            fn from(t: ( $( $tyvar ),* , )) -> Value {
                let ($($tyvar),*,) = t;
                Value::Array(vec![$($tyvar.into()),*])
            }
        }
    }
}

tuple_impl! {A}
tuple_impl! {A, B}
tuple_impl! {A, B, C}
tuple_impl! {A, B, C, D}
tuple_impl! {A, B, C, D, E}
tuple_impl! {A, B, C, D, E, F}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{:?}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Base64(bytes) => write!(f, "<base64 {} bytes>", bytes.len()),
            Value::DateTime(dt) => write!(f, "{}", dt),
            Value::Array(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Struct(members) => {
                f.write_str("{")?;
                for (idx, (key, value)) in members.iter().enumerate() {
                    if idx != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?}: {}", key, value)?;
                }
                f.write_str("}")
            }
            Value::Nil => f.write_str("nil"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Value;
    use std::collections::BTreeMap;

    fn zone() -> Value {
        let mut record = BTreeMap::new();
        record.insert("id".to_string(), Value::from(42));
        record.insert("value".to_string(), Value::from("10.0.0.1"));

        let mut zone = BTreeMap::new();
        zone.insert("name".to_string(), Value::from("example.com"));
        zone.insert("record".to_string(), Value::Struct(record));
        Value::Struct(zone)
    }

    #[test]
    fn test_find_path_and_search() {
        let zone = zone();

        assert_eq!(
            Some("10.0.0.1"),
            zone.find_path(&["record", "value"]).and_then(Value::as_str)
        );
        assert_eq!(None, zone.find_path(&["record", "missing"]));
        assert_eq!(Some(42), zone.search("id").and_then(Value::as_i32));
        assert_eq!(None, Value::from(1).get("id"));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::Int(7), Value::from(7u8));
        assert_eq!(Value::Nil, Value::from(None::<i32>));
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::String("two".into())]),
            Value::from((1, "two"))
        );
        assert_eq!(Some(3.0), Value::Int(3).as_f64());
        assert_eq!(None, Value::Int(i64::MAX).as_i32());
    }

    #[test]
    fn test_type_name() {
        assert_eq!("struct", zone().type_name());
        assert_eq!(
            "dateTime.iso8601",
            Value::DateTime(time::macros::datetime!(2024-01-01 0:00)).type_name()
        );
        assert_eq!("nil", Value::from(None::<&str>).type_name());
    }

    #[test]
    fn test_display() {
        let value = Value::from(vec![Value::from(1), Value::from("a"), Value::Nil]);
        assert_eq!("[1, \"a\", nil]", value.to_string());
        assert_eq!(
            "{\"name\": \"example.com\", \"record\": {\"id\": 42, \"value\": \"10.0.0.1\"}}",
            zone().to_string()
        );
    }
}
