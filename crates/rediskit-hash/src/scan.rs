//! # Custom Field Codecs
//!
//! A field type that knows how to read itself from a raw hash value
//! implements [`HashScan`] and is wired in with
//! `#[serde(with = "rediskit_hash::scan")]`. This takes precedence over the
//! default weak typing, which is how JSON blob columns decode leniently.

use std::ops::{Deref, DerefMut};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{HashError, Result};

const EMPTY_OBJECT: &str = "{}";

/// Types that decode and encode themselves from a single hash value.
pub trait HashScan: Sized {
    /// Build a value from the stored text.
    ///
    /// # Errors
    ///
    /// Implementations report text they cannot accept.
    fn scan(raw: &str) -> Result<Self>;

    /// Text to store for this value.
    ///
    /// # Errors
    ///
    /// Implementations report values they cannot render.
    fn value(&self) -> Result<String>;
}

/// Decode a JSON object column.
///
/// Empty input reads as `{}`. Array-shaped input is dirty data for an object
/// column and also reads as `{}`; anything else must be valid JSON.
///
/// # Errors
///
/// Returns [`HashError::Message`] naming the input when it is neither empty,
/// array-shaped nor valid JSON for `T`.
pub fn json_object<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let trimmed = raw.trim();
    let source = if trimmed.is_empty() || trimmed.starts_with('[') {
        EMPTY_OBJECT
    } else {
        trimmed
    };
    serde_json::from_str(source)
        .map_err(|err| HashError::Message(format!("invalid value `{raw}`: {err}")))
}

/// # Errors
///
/// Propagates [`HashScan::value`] failures through the serializer.
pub fn serialize<T, S>(value: &T, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    T: HashScan,
    S: Serializer,
{
    let text = value.value().map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&text)
}

/// # Errors
///
/// Propagates [`HashScan::scan`] failures through the deserializer.
pub fn deserialize<'de, T, D>(deserializer: D) -> std::result::Result<T, D::Error>
where
    T: HashScan,
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    T::scan(&raw).map_err(serde::de::Error::custom)
}

/// JSON object column for any serde type, decoded with [`json_object`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonObject<T>(pub T);

impl<T> JsonObject<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for JsonObject<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for JsonObject<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: Serialize + DeserializeOwned> HashScan for JsonObject<T> {
    fn scan(raw: &str) -> Result<Self> {
        json_object(raw).map(Self)
    }

    fn value(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

impl<T: Serialize + DeserializeOwned> Serialize for JsonObject<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serialize(self, serializer)
    }
}

impl<'de, T: Serialize + DeserializeOwned> Deserialize<'de> for JsonObject<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserialize(deserializer)
    }
}
