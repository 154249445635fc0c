//! Codec trait and the default JSON implementation.
//!
//! The protocol layer does not care how frames become bytes; anything
//! implementing [`Codec`] will do. [`JsonCodec`] is the default — readable
//! in browser DevTools, which is what the web client speaks.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Converts protocol types to and from bytes.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Ack, ServerFrame};

    #[test]
    fn test_json_codec_round_trip() {
        let codec = JsonCodec;
        let frame = ServerFrame::Ack(Ack::ok_empty(11));
        let bytes = codec.encode(&frame).unwrap();
        let decoded: ServerFrame = codec.decode(&bytes).unwrap();
        assert_eq!(frame, decoded);
    }

    #[test]
    fn test_json_codec_decode_rejects_truncated_input() {
        let codec = JsonCodec;
        let result: Result<ServerFrame, _> = codec.decode(b"{\"kind\":");
        assert!(result.is_err());
    }
}
