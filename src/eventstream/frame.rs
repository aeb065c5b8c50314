//! Binary frame layout of the upstream event stream.
//!
//! ```text
//! [4B totalLength][4B headersLength][headers][payload][4B trailer]
//! ```
//!
//! All integers are big-endian. Each header entry is
//! `[1B nameLength][name][1B valueType][2B valueLength][value]`; value type
//! `7` is a UTF-8 string, anything else is kept as opaque bytes. The trailer is
//! consumed but never verified.

use bytes::Bytes;
use rustc_hash::FxHashMap;

/// Bytes taken by the two length fields.
pub const PRELUDE_LEN: usize = 8;
/// Bytes taken by the trailing (unverified) checksum slot.
pub const TRAILER_LEN: usize = 4;
/// Smallest frame: prelude plus trailer, no headers, no payload.
pub const MIN_FRAME_LEN: usize = PRELUDE_LEN + TRAILER_LEN;
/// Declared lengths above this cannot come from a sane upstream.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const HEADER_TYPE_STRING: u8 = 7;
const HEADER_TYPE_BYTES: u8 = 6;

/// A decoded header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    String(String),
    Bytes(Bytes),
}

impl HeaderValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::String(value) => Some(value),
            HeaderValue::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
        }
    }
}

/// Frame payload: parsed JSON when the bytes are valid JSON text, raw bytes otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    Json(serde_json::Value),
    Bytes(Bytes),
}

impl FramePayload {
    fn from_slice(payload: &[u8]) -> Self {
        match serde_json::from_slice::<serde_json::Value>(payload) {
            Ok(value) => FramePayload::Json(value),
            Err(_) => FramePayload::Bytes(Bytes::copy_from_slice(payload)),
        }
    }

    /// `true` for an empty byte payload or a JSON `null`.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        match self {
            FramePayload::Json(value) => value.is_null(),
            FramePayload::Bytes(bytes) => bytes.is_empty(),
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            FramePayload::Json(value) => Some(value),
            FramePayload::Bytes(_) => None,
        }
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct WireFrame {
    pub headers: FxHashMap<String, HeaderValue>,
    pub payload: FramePayload,
    /// Exact number of input bytes this frame occupied, trailer included.
    pub total_length: u32,
}

impl WireFrame {
    /// Look up a header by name, accepting both `name` and `:name`.
    #[must_use]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        let mut prefixed = String::with_capacity(name.len() + 1);
        prefixed.push(':');
        prefixed.push_str(name);
        self.headers
            .get(&prefixed)
            .or_else(|| self.headers.get(name))
            .and_then(HeaderValue::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("declared frame length {declared} is outside {MIN_FRAME_LEN}..={MAX_FRAME_LEN}")]
    InvalidLength { declared: u32 },
    #[error("header name '{0}' longer than 255 bytes")]
    HeaderNameTooLong(String),
    #[error("header '{0}' value longer than 65535 bytes")]
    HeaderValueTooLong(String),
}

impl From<FrameError> for crate::error::GatewayError {
    fn from(err: FrameError) -> Self {
        crate::error::GatewayError::Frame(err.to_string())
    }
}

#[inline]
fn read_u32_be(buf: &[u8], at: usize) -> Option<u32> {
    let bytes = buf.get(at..at + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read the declared total length of the frame at offset 0, if at least 4 bytes are present.
#[must_use]
pub fn peek_total_length(buf: &[u8]) -> Option<u32> {
    read_u32_be(buf, 0)
}

/// Decode the first complete frame at offset 0 of `buf`.
///
/// Returns `Ok(None)` when fewer bytes than the declared total length are
/// available. Malformed header entries stop header parsing without failing the
/// frame.
///
/// # Errors
///
/// Returns [`FrameError::InvalidLength`] when the declared total length can
/// never describe a valid frame.
pub fn decode_frame(buf: &[u8]) -> Result<Option<WireFrame>, FrameError> {
    let Some(total_length) = peek_total_length(buf) else {
        return Ok(None);
    };
    let total = total_length as usize;
    if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&total) {
        return Err(FrameError::InvalidLength {
            declared: total_length,
        });
    }
    if buf.len() < total {
        return Ok(None);
    }

    let headers_length = read_u32_be(buf, 4).unwrap_or(0) as usize;
    let body_end = total - TRAILER_LEN;
    let headers_end = PRELUDE_LEN.saturating_add(headers_length).min(body_end);
    let headers = parse_headers(&buf[PRELUDE_LEN..headers_end]);
    let payload = FramePayload::from_slice(&buf[headers_end..body_end]);

    Ok(Some(WireFrame {
        headers,
        payload,
        total_length,
    }))
}

/// Best-effort header block parse; stops at the first truncated entry.
#[must_use]
pub fn parse_headers(block: &[u8]) -> FxHashMap<String, HeaderValue> {
    let mut headers = FxHashMap::default();
    let mut pos = 0usize;

    while pos < block.len() {
        let name_len = usize::from(block[pos]);
        pos += 1;
        let Some(name) = block.get(pos..pos + name_len) else {
            break;
        };
        pos += name_len;
        let Some(&value_type) = block.get(pos) else {
            break;
        };
        pos += 1;
        let Some(len_bytes) = block.get(pos..pos + 2) else {
            break;
        };
        let value_len = usize::from(u16::from_be_bytes([len_bytes[0], len_bytes[1]]));
        pos += 2;
        let Some(value) = block.get(pos..pos + value_len) else {
            break;
        };
        pos += value_len;

        let value = if value_type == HEADER_TYPE_STRING {
            HeaderValue::String(String::from_utf8_lossy(value).into_owned())
        } else {
            HeaderValue::Bytes(Bytes::copy_from_slice(value))
        };
        headers.insert(String::from_utf8_lossy(name).into_owned(), value);
    }

    headers
}

/// Encode one frame in the same layout [`decode_frame`] reads. The trailer is zero-filled.
///
/// # Errors
///
/// Returns [`FrameError`] when a header name or value does not fit its length field.
pub fn encode_frame(headers: &[(&str, HeaderValue)], payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut header_block = Vec::new();
    for (name, value) in headers {
        let name_len =
            u8::try_from(name.len()).map_err(|_| FrameError::HeaderNameTooLong((*name).to_string()))?;
        let (value_type, value_bytes) = match value {
            HeaderValue::String(s) => (HEADER_TYPE_STRING, s.as_bytes()),
            HeaderValue::Bytes(b) => (HEADER_TYPE_BYTES, b.as_ref()),
        };
        let value_len = u16::try_from(value_bytes.len())
            .map_err(|_| FrameError::HeaderValueTooLong((*name).to_string()))?;
        header_block.push(name_len);
        header_block.extend_from_slice(name.as_bytes());
        header_block.push(value_type);
        header_block.extend_from_slice(&value_len.to_be_bytes());
        header_block.extend_from_slice(value_bytes);
    }

    let total = MIN_FRAME_LEN + header_block.len() + payload.len();
    let total_length = u32::try_from(total).map_err(|_| FrameError::InvalidLength {
        declared: u32::MAX,
    })?;
    // Header block length is bounded by the total, which already fit.
    let headers_length = header_block.len() as u32;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&total_length.to_be_bytes());
    out.extend_from_slice(&headers_length.to_be_bytes());
    out.extend_from_slice(&header_block);
    out.extend_from_slice(payload);
    out.extend_from_slice(&[0u8; TRAILER_LEN]);
    Ok(out)
}

/// Encode a typical upstream JSON event frame (`:event-type`, `:content-type`, `:message-type`).
///
/// # Errors
///
/// Returns [`FrameError`] when the event type is too long for a header value.
pub fn encode_json_event(event_type: &str, payload: &serde_json::Value) -> Result<Vec<u8>, FrameError> {
    let body = payload.to_string();
    encode_frame(
        &[
            (":event-type", HeaderValue::String(event_type.to_string())),
            (
                ":content-type",
                HeaderValue::String("application/json".to_string()),
            ),
            (":message-type", HeaderValue::String("event".to_string())),
        ],
        body.as_bytes(),
    )
}
