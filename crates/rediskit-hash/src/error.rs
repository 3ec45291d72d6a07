//! Marshaling error types

use std::fmt::Display;

use thiserror::Error;

/// Errors raised while converting between structs and hash fields
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The source hash had no fields at all.
    #[error("data is empty")]
    NoData,

    #[error("value must serialize to a map or struct, got {0}")]
    NotAMap(&'static str),

    #[error("invalid value `{value}`: expected {expected}")]
    InvalidValue { value: String, expected: &'static str },

    #[error("{0}")]
    Message(String),
}

impl HashError {
    pub(crate) fn invalid(value: &str, expected: &'static str) -> Self {
        Self::InvalidValue {
            value: value.to_string(),
            expected,
        }
    }
}

impl serde::de::Error for HashError {
    fn custom<T: Display>(msg: T) -> Self {
        Self::Message(msg.to_string())
    }
}

impl serde::ser::Error for HashError {
    fn custom<T: Display>(msg: T) -> Self {
        Self::Message(msg.to_string())
    }
}

impl From<serde_json::Error> for HashError {
    fn from(err: serde_json::Error) -> Self {
        Self::Message(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HashError>;
