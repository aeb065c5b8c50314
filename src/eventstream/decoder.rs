use std::collections::VecDeque;

use bytes::{Buf, BytesMut};
use futures_util::Stream;

use super::frame::{decode_frame, FrameError, WireFrame};
use crate::error::GatewayError;

/// Incremental frame decoder over an accumulation buffer.
///
/// One decoder per byte source; it cannot be rewound.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Append newly arrived bytes.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Decode the next complete frame and drop its bytes from the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] when the buffered prelude declares an impossible length.
    pub fn next_frame(&mut self) -> Result<Option<WireFrame>, FrameError> {
        let Some(frame) = decode_frame(&self.buffer)? else {
            return Ok(None);
        };
        self.buffer.advance(frame.total_length as usize);
        Ok(Some(frame))
    }

    /// Decode every complete frame currently buffered into `out`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] on an impossible declared length; frames decoded
    /// before the bad prelude are still appended.
    pub fn decode_into<E: Extend<WireFrame>>(&mut self, out: &mut E) -> Result<(), FrameError> {
        while let Some(frame) = self.next_frame()? {
            out.extend(std::iter::once(frame));
        }
        Ok(())
    }

    /// Bytes buffered but not yet part of a complete frame.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Lift a transport byte stream into a lazy stream of decoded frames.
///
/// Frames decoded before a failure are yielded first, then the error, then
/// the stream ends. Bytes still buffered when the transport ends count as a
/// truncated frame.
pub fn frame_stream<S>(byte_stream: S) -> impl Stream<Item = Result<WireFrame, GatewayError>> + Send
where
    S: Stream<Item = Result<bytes::Bytes, GatewayError>> + Send + 'static,
{
    use futures_util::StreamExt;

    futures_util::stream::unfold(
        (
            Box::pin(byte_stream),
            FrameDecoder::new(),
            VecDeque::<WireFrame>::with_capacity(8),
            None::<GatewayError>,
            false,
        ),
        |(mut stream, mut decoder, mut pending, mut failure, mut done)| async move {
            loop {
                if let Some(frame) = pending.pop_front() {
                    return Some((Ok(frame), (stream, decoder, pending, failure, done)));
                }
                if let Some(err) = failure.take() {
                    return Some((Err(err), (stream, decoder, pending, None, true)));
                }
                if done {
                    return None;
                }

                match stream.as_mut().next().await {
                    Some(Ok(bytes)) => {
                        decoder.feed(&bytes);
                        if let Err(err) = decoder.decode_into(&mut pending) {
                            failure = Some(err.into());
                            done = true;
                        }
                    }
                    Some(Err(err)) => {
                        failure = Some(err);
                        done = true;
                    }
                    None => {
                        done = true;
                        let leftover = decoder.buffered_len();
                        if leftover > 0 {
                            failure = Some(GatewayError::Frame(format!(
                                "upstream stream ended inside a frame ({leftover} bytes buffered)"
                            )));
                        }
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventstream::frame::encode_json_event;
    use bytes::Bytes;
    use futures_util::StreamExt;
    use serde_json::json;

    fn three_frames() -> Vec<u8> {
        let mut wire = Vec::new();
        for (event, payload) in [
            ("initial-response", json!({"conversationId": "c1"})),
            ("assistantResponseEvent", json!({"content": "Hi"})),
            ("assistantResponseEnd", json!({})),
        ] {
            wire.extend(encode_json_event(event, &payload).unwrap());
        }
        wire
    }

    #[test]
    fn test_decoder_waits_for_complete_frame() {
        let wire = three_frames();
        let mut decoder = FrameDecoder::new();
        decoder.feed(&wire[..10]);
        assert!(decoder.next_frame().unwrap().is_none());
        decoder.feed(&wire[10..]);
        let mut frames = Vec::new();
        decoder.decode_into(&mut frames).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_byte_at_a_time_matches_whole_buffer() {
        let wire = three_frames();
        let mut whole = Vec::new();
        let mut decoder = FrameDecoder::new();
        decoder.feed(&wire);
        decoder.decode_into(&mut whole).unwrap();

        let mut trickled = Vec::new();
        let mut decoder = FrameDecoder::new();
        for byte in &wire {
            decoder.feed(std::slice::from_ref(byte));
            decoder.decode_into(&mut trickled).unwrap();
        }
        assert_eq!(whole, trickled);
    }

    #[tokio::test]
    async fn test_frame_stream_yields_frames_then_truncation_error() {
        let mut wire = three_frames();
        wire.extend_from_slice(&[0, 0, 0, 40, 0]);
        let chunks: Vec<Result<Bytes, GatewayError>> = wire
            .chunks(7)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        let items: Vec<_> = frame_stream(futures_util::stream::iter(chunks))
            .collect()
            .await;
        assert_eq!(items.len(), 4);
        assert!(items[..3].iter().all(Result::is_ok));
        assert!(matches!(items[3], Err(GatewayError::Frame(_))));
    }

    #[tokio::test]
    async fn test_frame_stream_surfaces_transport_error() {
        let chunks: Vec<Result<Bytes, GatewayError>> = vec![
            Ok(Bytes::from(three_frames())),
            Err(GatewayError::Transport("connection reset".into())),
            Ok(Bytes::from(three_frames())),
        ];
        let items: Vec<_> = frame_stream(futures_util::stream::iter(chunks))
            .collect()
            .await;
        assert_eq!(items.len(), 4);
        assert!(matches!(items[3], Err(GatewayError::Transport(_))));
    }
}
