//! Wire encodings shared by protocol types.

/// Serde adapter carrying opaque bytes as standard base64 strings.
pub mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| serde::de::Error::custom(format!("invalid base64 payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        #[serde(with = "super::base64_bytes", default)]
        data: Vec<u8>,
    }

    #[test]
    fn bytes_are_base64_on_the_wire() {
        let json = serde_json::to_string(&Payload {
            data: b"hello".to_vec(),
        })
        .unwrap();
        assert_eq!(json, r#"{"data":"aGVsbG8="}"#);
    }

    #[test]
    fn missing_data_defaults_to_empty() {
        let payload: Payload = serde_json::from_str("{}").unwrap();
        assert!(payload.data.is_empty());
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let err = serde_json::from_str::<Payload>(r#"{"data":"***"}"#).unwrap_err();
        assert!(err.to_string().contains("invalid base64 payload"));
    }
}
