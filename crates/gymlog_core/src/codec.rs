//! CBOR value encoding.
//!
//! Tables store opaque bytes. Layers above the engine store serde types
//! through these helpers so every table uses the same encoding.

use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes `value` as CBOR.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> CoreResult<Vec<u8>> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out).map_err(|e| CoreError::codec(e.to_string()))?;
    Ok(out)
}

/// Decodes a CBOR value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        notes: String,
        start: Option<String>,
    }

    #[test]
    fn struct_survives_encoding() {
        let row = Row {
            notes: "tempo run".into(),
            start: None,
        };
        let bytes = encode(&row).unwrap();
        assert_eq!(decode::<Row>(&bytes).unwrap(), row);
    }

    #[test]
    fn garbage_is_a_codec_error() {
        let err = decode::<Row>(&[0xff, 0x00]).unwrap_err();
        assert!(matches!(err, CoreError::Codec { .. }));
    }
}
