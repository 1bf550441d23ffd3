//! Typed encode/decode for values held in the mirror.
//!
//! Decoding is JSON parsing followed by a schema check. A value that fails
//! either step is reported as a `CodecError`, which the mirror treats as an
//! absent value.

use linguify_core::model::{PendingSyncRequest, ProgressSnapshot};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    #[error("malformed value: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid value: {0}")]
    Invalid(String),
}

/// Schema rules beyond what the serde derive enforces.
pub trait Validate {
    /// # Errors
    ///
    /// Returns a description of the first violated rule.
    fn validate(&self) -> Result<(), String>;
}

impl Validate for ProgressSnapshot {
    fn validate(&self) -> Result<(), String> {
        if self.parent_id.is_some() && self.entity.kind.parent_kind().is_none() {
            return Err(format!("{} cannot have a parent", self.entity));
        }
        Ok(())
    }
}

impl Validate for PendingSyncRequest {
    fn validate(&self) -> Result<(), String> {
        self.payload
            .validate_for(self.kind)
            .map_err(|e| format!("request {}: {e}", self.request_id))
    }
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<(), String> {
        self.iter().try_for_each(Validate::validate)
    }
}

/// # Errors
///
/// Returns `CodecError::Malformed` if serialization fails.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}

/// # Errors
///
/// Returns `CodecError` if `raw` is not valid JSON for `T` or violates its schema.
pub fn decode<T: DeserializeOwned + Validate>(raw: &str) -> Result<T, CodecError> {
    let value: T = serde_json::from_str(raw)?;
    value.validate().map_err(CodecError::Invalid)?;
    Ok(value)
}
