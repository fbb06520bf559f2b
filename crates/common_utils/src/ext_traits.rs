//! This module holds traits for extending functionalities for existing datatypes
//! & inbuilt datatypes.

use error_stack::ResultExt;
use serde::{Deserialize, Serialize};

use crate::errors::{self, CustomResult};

/// Extending functionalities of Wrapper types for idiomatic
#[cfg(not(tarpaulin_include))]
pub trait Encode
where
    Self: Serialize + std::fmt::Debug,
{
    /// Functionality, to encode `self` to string of JSON format
    fn encode_to_string_of_json(&self) -> CustomResult<String, errors::ParsingError>;

    /// Functionality, to encode `self` in the url-encoded form format
    fn url_encode(&self) -> CustomResult<String, errors::ParsingError>;

    /// Functionality, to encode `self` to a serde_json Value
    fn encode_to_value(&self) -> CustomResult<serde_json::Value, errors::ParsingError>;
}

impl<A> Encode for A
where
    A: Serialize + std::fmt::Debug,
{
    fn encode_to_string_of_json(&self) -> CustomResult<String, errors::ParsingError> {
        serde_json::to_string(self).change_context(errors::ParsingError::EncodeError("json"))
    }

    fn url_encode(&self) -> CustomResult<String, errors::ParsingError> {
        serde_urlencoded::to_string(self)
            .change_context(errors::ParsingError::EncodeError("url-encoded"))
    }

    fn encode_to_value(&self) -> CustomResult<serde_json::Value, errors::ParsingError> {
        serde_json::to_value(self).change_context(errors::ParsingError::EncodeError("json-value"))
    }
}

/// Extending functionalities of `[u8]` for performing parsing
pub trait ByteSliceExt {
    /// Convert to requested type which implements `serde::Deserialize`
    fn parse_struct<'de, T>(&'de self, type_name: &'static str)
        -> CustomResult<T, errors::ParsingError>
    where
        T: Deserialize<'de>;
}

impl ByteSliceExt for [u8] {
    #[track_caller]
    fn parse_struct<'de, T>(
        &'de self,
        type_name: &'static str,
    ) -> CustomResult<T, errors::ParsingError>
    where
        T: Deserialize<'de>,
    {
        serde_json::from_slice(self)
            .change_context(errors::ParsingError::StructParseFailure(type_name))
    }
}

/// Extending functionalities of `serde_json::Value` for performing parsing
pub trait ValueExt {
    /// Convert `serde_json::Value` into type `<T>`
    fn parse_value<T>(self, type_name: &'static str) -> CustomResult<T, errors::ParsingError>
    where
        T: serde::de::DeserializeOwned;
}

impl ValueExt for serde_json::Value {
    fn parse_value<T>(self, type_name: &'static str) -> CustomResult<T, errors::ParsingError>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_value(self)
            .change_context(errors::ParsingError::StructParseFailure(type_name))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn encode_and_parse_round_trip() {
        let value = Sample {
            name: "taksit".to_string(),
            count: 3,
        };
        let json = value.encode_to_string_of_json().expect("encode");
        let parsed: Sample = json.as_bytes().parse_struct("Sample").expect("parse");
        assert_eq!(parsed, value);
    }

    #[test]
    fn url_encode_keeps_field_order() {
        let value = Sample {
            name: "a b".to_string(),
            count: 1,
        };
        assert_eq!(value.url_encode().expect("encode"), "name=a+b&count=1");
    }
}
