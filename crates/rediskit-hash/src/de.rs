//! # Hash -> Struct Decoding
//!
//! Reads a full `HGETALL` reply back into a serde record. Every hash value is
//! text, so the field deserializer is weakly typed: numeric-looking strings
//! fill integer and float fields, `1`/`0`/`true`/`false` fill booleans, an
//! empty string is `None` for optional fields, and nested records are parsed
//! from JSON text.

use std::collections::HashMap;
use std::str::FromStr;

use serde::de::value::{BorrowedStrDeserializer, MapDeserializer};
use serde::de::{DeserializeOwned, Deserializer, IntoDeserializer, Visitor};

use crate::error::{HashError, Result};

/// Decode a hash into a record.
///
/// Unknown hash fields are ignored, missing fields follow the record's serde
/// defaults.
///
/// # Errors
///
/// Returns [`HashError::NoData`] for an empty hash, so callers can tell a
/// missing record apart from one whose fields are all zero. Any field that
/// cannot be converted yields an error naming the offending value.
pub fn from_hash<T, S>(hash: &HashMap<String, String, S>) -> Result<T>
where
    T: DeserializeOwned,
{
    if hash.is_empty() {
        return Err(HashError::NoData);
    }

    let entries = hash
        .iter()
        .map(|(field, value)| (field.as_str(), FieldValue(value.as_str())));

    T::deserialize(MapDeserializer::new(entries))
}

/// A single hash value seen as a weakly typed deserializer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldValue<'de>(pub(crate) &'de str);

impl FieldValue<'_> {
    fn number<N: FromStr + Default>(self, expected: &'static str) -> Result<N> {
        let trimmed = self.0.trim();
        if trimmed.is_empty() {
            return Ok(N::default());
        }
        trimmed
            .parse()
            .map_err(|_| HashError::invalid(self.0, expected))
    }

    fn flag(self) -> Result<bool> {
        match self.0.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "f" | "false" => Ok(false),
            "1" | "t" | "true" => Ok(true),
            _ => Err(HashError::invalid(self.0, "a boolean")),
        }
    }

    fn json_error(self, err: &serde_json::Error) -> HashError {
        HashError::Message(format!("invalid value `{}`: {err}", self.0))
    }
}

impl<'de> IntoDeserializer<'de, HashError> for FieldValue<'de> {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

macro_rules! deserialize_number {
    ($($method:ident => $visit:ident($ty:ty),)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
                visitor.$visit(self.number::<$ty>(stringify!($ty))?)
            }
        )*
    };
}

// Compound values are stored as JSON text.
macro_rules! deserialize_json {
    ($($method:ident($($arg:ident: $ty:ty),*),)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, $($arg: $ty,)* visitor: V) -> Result<V::Value> {
                let mut json = serde_json::Deserializer::from_str(self.0);
                let value = json
                    .$method($($arg,)* visitor)
                    .map_err(|err| self.json_error(&err))?;
                json.end().map_err(|err| self.json_error(&err))?;
                Ok(value)
            }
        )*
    };
}

impl<'de> Deserializer<'de> for FieldValue<'de> {
    type Error = HashError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_str(self.0)
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_bool(self.flag()?)
    }

    deserialize_number! {
        deserialize_i8 => visit_i8(i8),
        deserialize_i16 => visit_i16(i16),
        deserialize_i32 => visit_i32(i32),
        deserialize_i64 => visit_i64(i64),
        deserialize_i128 => visit_i128(i128),
        deserialize_u8 => visit_u8(u8),
        deserialize_u16 => visit_u16(u16),
        deserialize_u32 => visit_u32(u32),
        deserialize_u64 => visit_u64(u64),
        deserialize_u128 => visit_u128(u128),
        deserialize_f32 => visit_f32(f32),
        deserialize_f64 => visit_f64(f64),
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let mut chars = self.0.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => visitor.visit_char(ch),
            _ => Err(HashError::invalid(self.0, "a single character")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_str(self.0)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_str(self.0)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_bytes(self.0.as_bytes())
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_bytes(self.0.as_bytes())
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.0.is_empty() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    deserialize_json! {
        deserialize_seq(),
        deserialize_tuple(len: usize),
        deserialize_tuple_struct(name: &'static str, len: usize),
        deserialize_map(),
        deserialize_struct(name: &'static str, fields: &'static [&'static str]),
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        if self.0.trim_start().starts_with('{') {
            let mut json = serde_json::Deserializer::from_str(self.0);
            let value = json
                .deserialize_enum(name, variants, visitor)
                .map_err(|err| self.json_error(&err))?;
            json.end().map_err(|err| self.json_error(&err))?;
            return Ok(value);
        }
        visitor.visit_enum(BorrowedStrDeserializer::<HashError>::new(self.0.trim()))
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_str(self.0)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "snake_case")]
    enum Status {
        Active,
        Banned,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Profile {
        city: String,
    }

    #[derive(Debug, Deserialize)]
    struct Account {
        user_id: i64,
        score: f64,
        verified: bool,
        nickname: Option<String>,
        status: Status,
        profile: Profile,
        tags: Vec<u32>,
        #[serde(default)]
        lang: String,
    }

    fn hash(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_weakly_typed_fields() {
        let src = hash(&[
            ("user_id", " 4 "),
            ("score", "9.5"),
            ("verified", "1"),
            ("nickname", ""),
            ("status", "banned"),
            ("profile", r#"{"city":"Shanghai"}"#),
            ("tags", "[1,2,3]"),
            ("unknown_field", "ignored"),
        ]);

        let account: Account = from_hash(&src).unwrap();

        assert_eq!(account.user_id, 4);
        assert!((account.score - 9.5).abs() < f64::EPSILON);
        assert!(account.verified);
        assert_eq!(account.nickname, None);
        assert_eq!(account.status, Status::Banned);
        assert_eq!(account.profile, Profile { city: "Shanghai".into() });
        assert_eq!(account.tags, vec![1, 2, 3]);
        assert_eq!(account.lang, "");
    }

    #[test]
    fn test_empty_numbers_and_flags_are_zero() {
        #[derive(Debug, Deserialize)]
        struct Counters {
            hits: u64,
            enabled: bool,
        }

        let counters: Counters = from_hash(&hash(&[("hits", ""), ("enabled", "")])).unwrap();
        assert_eq!(counters.hits, 0);
        assert!(!counters.enabled);
    }

    #[test]
    fn test_empty_hash_is_no_data() {
        let err = from_hash::<Profile, _>(&HashMap::new()).unwrap_err();
        assert_eq!(err, HashError::NoData);
    }

    #[test]
    fn test_invalid_number_names_value() {
        #[derive(Debug, Deserialize)]
        struct Row {
            #[allow(dead_code)]
            user_id: i32,
        }

        let err = from_hash::<Row, _>(&hash(&[("user_id", "12abc")])).unwrap_err();
        assert_eq!(
            err,
            HashError::InvalidValue {
                value: "12abc".into(),
                expected: "i32",
            }
        );
        assert!(err.to_string().contains("12abc"));
    }

    #[test]
    fn test_invalid_flag_names_value() {
        #[derive(Debug, Deserialize)]
        struct Row {
            #[allow(dead_code)]
            verified: bool,
        }

        let err = from_hash::<Row, _>(&hash(&[("verified", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("maybe"));
    }

    #[test]
    fn test_malformed_nested_json_names_value() {
        let err = from_hash::<Account, _>(&hash(&[
            ("user_id", "1"),
            ("score", "1"),
            ("verified", "0"),
            ("status", "active"),
            ("profile", "{not json"),
            ("tags", "[]"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("{not json"));
    }

    #[test]
    fn test_missing_required_field() {
        let err = from_hash::<Profile, _>(&hash(&[("street", "x")])).unwrap_err();
        assert!(err.to_string().contains("city"));
    }

    #[test]
    fn test_decodes_into_plain_map() {
        let src = hash(&[("a", "1"), ("b", "2")]);
        let map: std::collections::BTreeMap<String, i64> = from_hash(&src).unwrap();
        assert_eq!(map["a"], 1);
        assert_eq!(map["b"], 2);
    }
}
