//! Archive codec (spec §4.3): wraps/unwraps request and response payloads in
//! the keyed-archive value model and its two canonical root envelopes.

mod codec;
mod value;

pub use codec::Decoder;
pub use value::{Color, EdgeInsets, Point, Rect, Size, Value};

use crate::error::Error;

/// Root class name used for the single-field request envelope (spec's
/// "Attachment: the canonical single-field envelope class used to wrap
/// request payloads").
pub const REQUEST_ATTACHMENT_CLASS: &str = "LookinRequestAttachment";

/// Root class name of the decoded response envelope.
pub const RESPONSE_ATTACHMENT_CLASS: &str = "LookinResponseAttachment";

/// Wrap `payload` in the request-attachment envelope and encode it.
pub fn encode_attachment(payload: Value) -> Vec<u8> {
    let envelope = Value::classed(REQUEST_ATTACHMENT_CLASS, [("data", payload)]);
    codec::encode(&envelope)
}

/// Encode a bare dictionary payload (the other canonical request shape).
pub fn encode_dict(payload: Value) -> Vec<u8> {
    codec::encode(&payload)
}

/// The decoded response envelope (spec §4.3's "Decode" behavior).
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub data: Option<Value>,
    pub error: Option<Value>,
    pub app_is_in_background: bool,
}

/// Decode a response payload into its envelope, applying class remapping.
pub fn decode_response(bytes: &[u8]) -> Result<ResponseEnvelope, Error> {
    let decoder = Decoder::new();
    let value = decoder.decode(bytes)?;

    let fields = value.as_dict().ok_or_else(|| {
        Error::InvalidFrame("response envelope is not a dictionary-shaped object".into())
    })?;

    let data = fields.get("data").filter(|v| **v != Value::Null).cloned();
    let error = fields.get("error").filter(|v| **v != Value::Null).cloned();
    let app_is_in_background = fields
        .get("appIsInBackground")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(ResponseEnvelope {
        data,
        error,
        app_is_in_background,
    })
}
