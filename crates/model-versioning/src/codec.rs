use serde_json::Value;

/// Converts raw bytes to and from the generic JSON tree.
pub trait TreeCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Value, serde_json::Error>;
    fn encode(&self, tree: &Value) -> Result<Vec<u8>, serde_json::Error>;
}

/// JSON text codec backed by `serde_json`.
///
/// Empty or whitespace-only input decodes to `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl TreeCodec for JsonCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Value, serde_json::Error> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(bytes)
    }

    fn encode(&self, tree: &Value) -> Result<Vec<u8>, serde_json::Error> {
        if self.pretty {
            serde_json::to_vec_pretty(tree)
        } else {
            serde_json::to_vec(tree)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_input_is_null() {
        assert_eq!(JsonCodec::compact().decode(b"").unwrap(), Value::Null);
        assert_eq!(JsonCodec::compact().decode(b"  \n").unwrap(), Value::Null);
    }

    #[test]
    fn decode_error_surfaces() {
        assert!(JsonCodec::compact().decode(b"{nope").is_err());
    }

    #[test]
    fn pretty_and_compact() {
        let tree = json!({"a": 1});
        assert_eq!(JsonCodec::compact().encode(&tree).unwrap(), br#"{"a":1}"#);
        let pretty = String::from_utf8(JsonCodec::pretty().encode(&tree).unwrap()).unwrap();
        assert!(pretty.contains('\n'));
    }
}
