//! # Hash Time Convention
//!
//! Time fields are stored as `YYYY-MM-DD HH:MM:SS` in the value's own zone,
//! without a zone designator. Use with `#[serde(with = "rediskit_hash::time")]`
//! (or [`option`] for `Option<_>` fields).
//!
//! Decoding tries, in order:
//!
//! 1. a timestamp carrying its own offset (RFC 3339 or chrono's text form);
//! 2. `YYYY-MM-DD HH:MM:SS`, or `YYYY-MM-DDTHH:MM:SS` when the text contains a
//!    `T`, read in the field type's own zone: UTC for `DateTime<Utc>`, the
//!    machine zone for `DateTime<Local>`, and the fixed default zone
//!    (UTC+08:00) for `DateTime<FixedOffset>`. `NaiveDateTime` keeps the
//!    wall clock as written.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer};

use crate::error::{HashError, Result};

/// Wall-clock layout written to hash fields.
pub const TIME_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

/// Offset applied when a stored timestamp has no zone information.
pub const DEFAULT_OFFSET_SECS: i32 = 8 * 3600;

const SPACE_LAYOUT: &str = "%Y-%m-%d %H:%M:%S%.f";
const T_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// The default zone for timestamps without an offset.
#[must_use]
pub fn default_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Time types that can live in a hash field.
pub trait HashTime: Sized {
    /// Render as [`TIME_LAYOUT`] in the value's own zone.
    fn format_hash(&self) -> String;

    /// Read stored text, placing zone-less values in this type's zone.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::InvalidValue`] naming `raw` when no layout matches.
    fn parse_hash(raw: &str) -> Result<Self>;
}

impl HashTime for DateTime<FixedOffset> {
    fn format_hash(&self) -> String {
        self.format(TIME_LAYOUT).to_string()
    }

    fn parse_hash(raw: &str) -> Result<Self> {
        parse_time(raw)
    }
}

impl HashTime for DateTime<Utc> {
    fn format_hash(&self) -> String {
        self.format(TIME_LAYOUT).to_string()
    }

    fn parse_hash(raw: &str) -> Result<Self> {
        parse_in(raw, &Utc)
    }
}

impl HashTime for DateTime<Local> {
    fn format_hash(&self) -> String {
        self.format(TIME_LAYOUT).to_string()
    }

    fn parse_hash(raw: &str) -> Result<Self> {
        parse_in(raw, &Local)
    }
}

impl HashTime for NaiveDateTime {
    fn format_hash(&self) -> String {
        self.format(TIME_LAYOUT).to_string()
    }

    fn parse_hash(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        match raw.parse::<DateTime<FixedOffset>>() {
            Ok(value) => Ok(value.naive_local()),
            Err(_) => parse_naive(raw),
        }
    }
}

/// Parse a stored timestamp in the default zone.
///
/// # Errors
///
/// Returns [`HashError::InvalidValue`] naming `raw` when no layout matches.
pub fn parse_time(raw: &str) -> Result<DateTime<FixedOffset>> {
    parse_in(raw, &default_offset())
}

/// Parse a stored timestamp, reading zone-less text in `zone`.
///
/// # Errors
///
/// Returns [`HashError::InvalidValue`] naming `raw` when no layout matches
/// or the wall clock does not exist exactly once in `zone`.
pub fn parse_in<Tz: TimeZone>(raw: &str, zone: &Tz) -> Result<DateTime<Tz>> {
    let raw = raw.trim();

    if let Ok(value) = raw.parse::<DateTime<FixedOffset>>() {
        return Ok(value.with_timezone(zone));
    }

    let naive = parse_naive(raw)?;
    zone.from_local_datetime(&naive)
        .single()
        .ok_or_else(|| HashError::invalid(raw, "an unambiguous local time"))
}

fn parse_naive(raw: &str) -> Result<NaiveDateTime> {
    let layout = if raw.contains('T') { T_LAYOUT } else { SPACE_LAYOUT };
    NaiveDateTime::parse_from_str(raw, layout)
        .map_err(|_| HashError::invalid(raw, "a `YYYY-MM-DD HH:MM:SS` timestamp"))
}

/// Serialize a time field with [`TIME_LAYOUT`].
///
/// # Errors
///
/// Propagates the serializer's error.
pub fn serialize<T, S>(value: &T, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    T: HashTime,
    S: Serializer,
{
    serializer.serialize_str(&value.format_hash())
}

/// Deserialize a time field stored by [`serialize`] or by another writer.
///
/// # Errors
///
/// Fails when the text matches none of the accepted layouts.
pub fn deserialize<'de, T, D>(deserializer: D) -> std::result::Result<T, D::Error>
where
    T: HashTime,
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    T::parse_hash(&raw).map_err(serde::de::Error::custom)
}

/// Same convention for optional time fields; an empty string is `None`.
pub mod option {
    use super::HashTime;
    use serde::{Deserialize, Deserializer, Serializer};

    /// # Errors
    ///
    /// Propagates the serializer's error.
    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: HashTime,
        S: Serializer,
    {
        match value {
            Some(value) => serializer.serialize_str(&value.format_hash()),
            None => serializer.serialize_none(),
        }
    }

    /// # Errors
    ///
    /// Fails when a non-empty value matches none of the accepted layouts.
    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: HashTime,
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => T::parse_hash(raw)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
