use serde::{Serialize, Deserialize};

use std::collections::BTreeMap;

mod error;
pub use error::{BencodeError, TypeMismatch};

mod parsing;

/// Deepest list/dictionary nesting the decoder accepts.
pub const MAX_NESTING_DEPTH: usize = 200;

/// Represents a value in the Bencode format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BencodedValue {
    /// Represents a Bencoded dictionary (key-value pairs).
    /// Keys are kept in ascending byte order, which is also the canonical encoding order.
    Dict(BTreeMap<Vec<u8>, BencodedValue>),

    /// Represents a Bencoded list of values.
    List(Vec<BencodedValue>),

    /// Represents a Bencoded integer.
    Integer(i64),

    /// Represents a Bencoded byte string.
    ByteString(Vec<u8>),
}

impl BencodedValue {
    /// Decodes a complete bencoded buffer. Trailing bytes after the root value are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<BencodedValue, BencodeError> {
        parsing::decode(bytes)
    }

    /// Canonical encoding of the value. Never fails.
    pub fn as_bytes(&self) -> Vec<u8> {
        parsing::encode(self)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BencodedValue::Dict(_) => "dictionary",
            BencodedValue::List(_) => "list",
            BencodedValue::Integer(_) => "integer",
            BencodedValue::ByteString(_) => "byte string",
        }
    }

    pub fn try_into_dict(&self) -> Result<&BTreeMap<Vec<u8>, BencodedValue>, TypeMismatch> {
        match self {
            BencodedValue::Dict(d) => Ok(d),
            _ => Err(TypeMismatch::new("dictionary", self))
        }
    }

    pub fn try_into_integer(&self) -> Result<i64, TypeMismatch> {
        match self {
            BencodedValue::Integer(i) => Ok(*i),
            _ => Err(TypeMismatch::new("integer", self))
        }
    }

    pub fn try_into_list(&self) -> Result<&Vec<BencodedValue>, TypeMismatch> {
        match self {
            BencodedValue::List(l) => Ok(l),
            _ => Err(TypeMismatch::new("list", self))
        }
    }

    pub fn try_into_byte_string(&self) -> Result<&Vec<u8>, TypeMismatch> {
        match self {
            BencodedValue::ByteString(b) => Ok(b),
            _ => Err(TypeMismatch::new("byte string", self))
        }
    }

    /// Byte string rendered as text, replacing invalid UTF-8 sequences.
    pub fn try_into_lossy_string(&self) -> Result<String, TypeMismatch> {
        let bytes = self.try_into_byte_string()?;

        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn get_from_dict(&self, key: &[u8]) -> Option<&BencodedValue> {
        match self {
            BencodedValue::Dict(d) => d.get(key),
            _ => None
        }
    }
}

#[cfg(test)]
mod bencoded_value_tests {
    use super::*;

    #[test]
    fn test_get_from_dict() {
        let dict = BencodedValue::Dict(BTreeMap::from([(b"key".to_vec(), BencodedValue::Integer(1))]));

        assert_eq!(Some(&BencodedValue::Integer(1)), dict.get_from_dict(b"key"));
        assert_eq!(None, dict.get_from_dict(b"da"));
    }

    #[test]
    fn test_get_from_dict_non_dict() {
        let value = BencodedValue::Integer(1);

        assert_eq!(None, value.get_from_dict(b"key"));
    }

    #[test]
    fn test_try_into_dict_on_non_dict() {
        let value = BencodedValue::ByteString(b"spam".to_vec());

        let err = value.try_into_dict().unwrap_err();
        assert_eq!("expected a dictionary, found a byte string", err.to_string());
    }

    #[test]
    fn test_type_mismatch_messages() {
        let value = BencodedValue::List(Vec::new());

        assert_eq!("expected an integer, found a list", value.try_into_integer().unwrap_err().to_string());
        assert_eq!("expected a byte string, found a list", value.try_into_byte_string().unwrap_err().to_string());
        assert!(value.try_into_list().is_ok());
    }

    #[test]
    fn test_lossy_string_replaces_invalid_utf8() {
        let value = BencodedValue::ByteString(vec![b'a', 0xff, b'b']);

        assert_eq!("a\u{fffd}b", value.try_into_lossy_string().unwrap());
    }
}
