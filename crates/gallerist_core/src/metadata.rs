//! Free-form media metadata.

use gallerist_error::InputError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

/// Upper bound on the serialized size of a metadata document (1 MiB).
pub const MAX_METADATA_BYTES: usize = 1024 * 1024;

/// Opaque key/value metadata attached to a media record.
///
/// Held as its compact serialized JSON form so the size rule can be checked
/// without re-encoding, and so storage backends never need to know its shape.
///
/// # Examples
///
/// ```
/// use gallerist_core::Metadata;
/// use serde_json::json;
///
/// let meta = Metadata::from_value(&json!({"camera": "X100V"}));
/// assert_eq!(meta.to_value().unwrap()["camera"], "X100V");
/// assert!(meta.serialized_len() < 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    raw: Vec<u8>,
}

impl Metadata {
    /// An empty JSON object.
    pub fn empty() -> Self {
        Self {
            raw: b"{}".to_vec(),
        }
    }

    /// Capture a JSON value.
    pub fn from_value(value: &JsonValue) -> Self {
        Self {
            raw: value.to_string().into_bytes(),
        }
    }

    /// Accept already-serialized bytes, rejecting anything that is not JSON.
    pub fn from_bytes(raw: Vec<u8>) -> Result<Self, InputError> {
        serde_json::from_slice::<serde::de::IgnoredAny>(&raw)
            .map_err(|e| InputError::new(format!("metadata is not valid JSON: {}", e)))?;
        Ok(Self { raw })
    }

    /// The serialized bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Size of the serialized form in bytes.
    pub fn serialized_len(&self) -> usize {
        self.raw.len()
    }

    /// Decode into a JSON value.
    pub fn to_value(&self) -> Result<JsonValue, serde_json::Error> {
        serde_json::from_slice(&self.raw)
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_invalid_json_bytes() {
        assert!(Metadata::from_bytes(b"{not json".to_vec()).is_err());
        assert!(Metadata::from_bytes(b"{\"a\":1}".to_vec()).is_ok());
    }

    #[test]
    fn test_empty_is_object() {
        assert_eq!(Metadata::empty().to_value().unwrap(), json!({}));
    }

    #[test]
    fn test_serde_is_transparent_json() {
        let meta = Metadata::from_value(&json!({"tags": ["a", "b"]}));
        let text = serde_json::to_string(&meta).unwrap();
        assert_eq!(text, r#"{"tags":["a","b"]}"#);
        let back: Metadata = serde_json::from_str(&text).unwrap();
        assert_eq!(back, meta);
    }
}
