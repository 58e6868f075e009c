use super::{Error, Protocol, Result};

pub const FRAME_DELIMITER: u8 = b'\n';

/// One compact JSON document per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLineProtocol;

impl Protocol for JsonLineProtocol {
    fn serialize<T: serde::Serialize>(&self, data: &T) -> Result<Vec<u8>> {
        // Compact output escapes control characters, so the delimiter only appears at the end
        let mut bytes = serde_json::to_vec(data).map_err(|e| Error::Serialization(e.to_string()))?;
        bytes.push(FRAME_DELIMITER);
        Ok(bytes)
    }

    fn deserialize<T: for<'de> serde::Deserialize<'de>>(&self, bytes: &[u8]) -> Result<T> {
        let frame = bytes.strip_suffix(&[FRAME_DELIMITER]).unwrap_or(bytes);
        let frame = frame.strip_suffix(b"\r").unwrap_or(frame);
        serde_json::from_slice(frame).map_err(|e| Error::Deserialization(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "json-line"
    }
}
