//! Frame encoding negotiation.
//!
//! The wire protocol carries the same envelopes in two encodings: JSON on
//! text frames and MessagePack on binary frames. The encoding is decided by
//! the client per request. A response always mirrors the encoding of the
//! request it answers, so text in means text out and binary in means binary
//! out.

use junction_core::{Request, ResponseFrame};

use crate::error::TransportResult;

/// The negotiated encoding of one request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireEncoding {
    /// JSON on a text frame.
    Json,
    /// MessagePack on a binary frame.
    MsgPack,
}

/// An encoded frame ready for the socket, tagged with its frame type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    /// Send as a text frame.
    Text(String),
    /// Send as a binary frame.
    Binary(Vec<u8>),
}

impl WireEncoding {
    /// Decodes an inbound request frame.
    pub fn decode_request(&self, bytes: &[u8]) -> TransportResult<Request> {
        match self {
            Self::Json => Ok(serde_json::from_slice(bytes)?),
            Self::MsgPack => Ok(rmp_serde::from_slice(bytes)?),
        }
    }

    /// Decodes an inbound response frame (client side).
    pub fn decode_frame(&self, bytes: &[u8]) -> TransportResult<ResponseFrame> {
        match self {
            Self::Json => Ok(serde_json::from_slice(bytes)?),
            Self::MsgPack => Ok(rmp_serde::from_slice(bytes)?),
        }
    }

    /// Encodes an outbound request frame (client side).
    pub fn encode_request(&self, request: &Request) -> TransportResult<WireFrame> {
        match self {
            Self::Json => Ok(WireFrame::Text(
                serde_json::to_string(request).map_err(|e| crate::error::TransportError::Encode(e.to_string()))?,
            )),
            Self::MsgPack => Ok(WireFrame::Binary(rmp_serde::to_vec_named(request)?)),
        }
    }

    /// Encodes an outbound response frame.
    pub fn encode_frame(&self, frame: &ResponseFrame) -> TransportResult<WireFrame> {
        match self {
            Self::Json => Ok(WireFrame::Text(
                serde_json::to_string(frame).map_err(|e| crate::error::TransportError::Encode(e.to_string()))?,
            )),
            Self::MsgPack => Ok(WireFrame::Binary(rmp_serde::to_vec_named(frame)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use junction_core::{DispatchError, RequestKind};
    use serde_json::json;

    fn frame_bytes(frame: &WireFrame) -> &[u8] {
        match frame {
            WireFrame::Text(text) => text.as_bytes(),
            WireFrame::Binary(bytes) => bytes,
        }
    }

    #[test]
    fn responses_round_trip_in_both_encodings() {
        let bodies = [
            json!(true),
            json!(42),
            json!(-1.5),
            json!("text"),
            json!([1, "two", null]),
            json!({ "nested": { "ok": true }, "list": [1, 2, 3] }),
            json!(null),
        ];
        for encoding in [WireEncoding::Json, WireEncoding::MsgPack] {
            for body in &bodies {
                let frame = ResponseFrame::result("id-1", 200, body.clone());
                let encoded = encoding.encode_frame(&frame).unwrap();
                let decoded = encoding.decode_frame(frame_bytes(&encoded)).unwrap();
                assert_eq!(decoded.id, "id-1");
                assert_eq!(decoded.status, Some(200));
                assert_eq!(&decoded.message, body);
            }
        }
    }

    #[test]
    fn json_encodes_to_text_and_msgpack_to_binary() {
        let frame = ResponseFrame::result("a", 200, json!({ "ok": true }));
        assert!(matches!(
            WireEncoding::Json.encode_frame(&frame).unwrap(),
            WireFrame::Text(_)
        ));
        assert!(matches!(
            WireEncoding::MsgPack.encode_frame(&frame).unwrap(),
            WireFrame::Binary(_)
        ));
    }

    #[test]
    fn requests_round_trip_in_both_encodings() {
        let request = Request::new("r1", "/echo/hello", RequestKind::Subscribe)
            .with_data(json!({ "volume": 11 }));
        for encoding in [WireEncoding::Json, WireEncoding::MsgPack] {
            let encoded = encoding.encode_request(&request).unwrap();
            let decoded = encoding.decode_request(frame_bytes(&encoded)).unwrap();
            assert_eq!(decoded.id, "r1");
            assert_eq!(decoded.path, "/echo/hello");
            assert_eq!(decoded.kind, RequestKind::Subscribe);
            assert_eq!(decoded.data, Some(json!({ "volume": 11 })));
        }
    }

    #[test]
    fn error_frames_round_trip_through_msgpack() {
        let frame = ResponseFrame::error("d", &DispatchError::NotFound);
        let encoded = WireEncoding::MsgPack.encode_frame(&frame).unwrap();
        let decoded = WireEncoding::MsgPack
            .decode_frame(frame_bytes(&encoded))
            .unwrap();
        assert_eq!(decoded.status, Some(404));
        assert_eq!(decoded.status_code.as_deref(), Some("NOT_FOUND"));
        assert_eq!(decoded.message, json!("Not Found"));
    }

    #[test]
    fn garbage_frames_fail_to_decode() {
        assert!(WireEncoding::Json.decode_request(b"not json").is_err());
        assert!(WireEncoding::MsgPack.decode_request(b"\xc1garbage").is_err());
    }
}
