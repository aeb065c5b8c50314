//! Decoding of the upstream binary event stream.

pub mod decoder;
pub mod event;
pub mod frame;

pub use decoder::{frame_stream, FrameDecoder};
pub use event::{extract_event, UpstreamEvent};
pub use frame::{
    decode_frame, encode_frame, encode_json_event, FrameError, FramePayload, HeaderValue,
    WireFrame,
};
