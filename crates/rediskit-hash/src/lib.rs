//! # rediskit-hash
//!
//! Marshaling between Rust records and Redis hashes.
//!
//! A record's serde derive is its hash schema: the serde field name is the
//! hash field, field attributes select the codec.
//!
//! ```rust,ignore
//! use chrono::{DateTime, Utc};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct User {
//!     user_id: i64,
//!     user_name: String,
//!     #[serde(with = "rediskit_hash::time")]
//!     create_time: DateTime<Utc>,
//! }
//!
//! let fields = rediskit_hash::to_hash(&user)?;            // -> HSET key f1 v1 f2 v2 ...
//! let user: User = rediskit_hash::from_hash(&hgetall)?;   // <- HGETALL key
//! ```
//!
//! ## Conventions
//!
//! - Time fields are written as `YYYY-MM-DD HH:MM:SS` ([`time`])
//! - Values without a zone are read in UTC+08:00
//! - Fields implementing [`HashScan`] decode themselves ([`scan`])
//! - An empty hash is [`HashError::NoData`], never a zero-valued record

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod de;
pub mod error;
pub mod scan;
mod ser;
pub mod time;

pub use de::from_hash;
pub use error::{HashError, Result};
pub use scan::{json_object, HashScan, JsonObject};
pub use ser::to_hash;
pub use time::{default_offset, parse_in, parse_time, HashTime, DEFAULT_OFFSET_SECS, TIME_LAYOUT};
