//! Stored object contract and the versioned JSON envelope.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Trait for types that can be stored in an [`crate::IndexedStore`].
///
/// Implementors must provide:
/// - `object_id()`: a stable identifier, unique within its store
/// - `marshal_binary()`: serializes the object to bytes
/// - `unmarshal_binary()`: rebuilds the object from those bytes
///
/// The ID becomes the last component of the object's data key, so it must
/// be non-empty and must not contain `/`. Stores reject such IDs on write.
///
/// # Example
///
/// ```rust
/// use metastore_core::{BinaryObject, StoreError, StoreResult};
///
/// struct Task {
///     id: String,
///     script: String,
/// }
///
/// impl BinaryObject for Task {
///     fn object_id(&self) -> &str {
///         &self.id
///     }
///
///     fn marshal_binary(&self) -> StoreResult<Vec<u8>> {
///         Ok(format!("{}\n{}", self.id, self.script).into_bytes())
///     }
///
///     fn unmarshal_binary(data: &[u8]) -> StoreResult<Self> {
///         let text = std::str::from_utf8(data).map_err(|e| StoreError::codec(e.to_string()))?;
///         let (id, script) = text
///             .split_once('\n')
///             .ok_or_else(|| StoreError::codec("missing separator"))?;
///         Ok(Task { id: id.into(), script: script.into() })
///     }
/// }
/// ```
pub trait BinaryObject: Sized {
    /// Returns the object's stable identifier.
    ///
    /// It must survive a marshal/unmarshal round trip unchanged.
    fn object_id(&self) -> &str;

    /// Encodes the object.
    fn marshal_binary(&self) -> StoreResult<Vec<u8>>;

    /// Decodes an object previously produced by [`BinaryObject::marshal_binary`].
    fn unmarshal_binary(data: &[u8]) -> StoreResult<Self>;
}

/// A JSON envelope that tags a stored value with its format version.
///
/// Serialized as `{"version": 1, "value": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionWrapper {
    /// Format version of `value`.
    pub version: u32,
    /// The wrapped value.
    #[serde(default)]
    pub value: Option<Value>,
}

/// Encodes `value` as JSON inside a [`VersionWrapper`].
///
/// # Errors
///
/// Returns [`StoreError::Json`] if `value` cannot be serialized.
pub fn version_json_encode<T: Serialize>(version: u32, value: &T) -> StoreResult<Vec<u8>> {
    let wrapper = VersionWrapper {
        version,
        value: Some(serde_json::to_value(value)?),
    };
    Ok(serde_json::to_vec(&wrapper)?)
}

/// Decodes a [`VersionWrapper`] and hands its version and value to `decode`.
///
/// `decode` picks the right shape for the version it is given.
///
/// # Errors
///
/// Returns [`StoreError::Json`] for malformed JSON, [`StoreError::Codec`] if
/// the envelope carries no value, or whatever `decode` returns.
pub fn version_json_decode<T, F>(data: &[u8], decode: F) -> StoreResult<T>
where
    F: FnOnce(u32, Value) -> StoreResult<T>,
{
    let wrapper: VersionWrapper = serde_json::from_slice(data)?;
    let value = wrapper
        .value
        .ok_or_else(|| StoreError::codec("version envelope has no value"))?;
    decode(wrapper.version, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Template {
        id: String,
        kind: String,
    }

    #[test]
    fn envelope_roundtrip() {
        let template = Template {
            id: "t1".into(),
            kind: "stream".into(),
        };
        let data = version_json_encode(2, &template).unwrap();

        let decoded = version_json_decode(&data, |version, value| {
            assert_eq!(version, 2);
            Ok(serde_json::from_value::<Template>(value)?)
        })
        .unwrap();
        assert_eq!(decoded, template);
    }

    #[test]
    fn envelope_layout() {
        let data = version_json_encode(1, &"x").unwrap();
        let raw: Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(raw, serde_json::json!({"version": 1, "value": "x"}));
    }

    #[test]
    fn envelope_missing_value_rejected() {
        for data in [&br#"{"version": 1}"#[..], br#"{"version": 1, "value": null}"#] {
            let err = version_json_decode(data, |_, _| Ok(())).unwrap_err();
            assert!(matches!(err, StoreError::Codec { .. }), "got {err:?}");
        }
    }

    #[test]
    fn envelope_malformed_json() {
        let err = version_json_decode(b"not json", |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }
}
