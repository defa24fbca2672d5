//! Server-sent event decoding for chat responses.
//!
//! The chat endpoint answers with a UTF-8 body made of segments separated by a
//! blank line.  Within a segment, the first line starting with `data:` carries
//! a JSON object `{ "role"?: string, "content"?: string }`.  This module turns
//! the raw byte stream into a stream of [`StreamEvent`]s.
//!
//! Framing happens on bytes: the separator is ASCII, so it can never fall
//! inside a multi-byte character, and a character split across two reads is
//! reassembled before the segment it belongs to is decoded.

use std::time::Instant;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use tokio_util::codec::Decoder;

use crate::observability::{
    STREAM_BYTES, STREAM_DROPPED_EMPTY, STREAM_DURATION, STREAM_ERRORS, STREAM_EVENTS,
    STREAM_MALFORMED,
};
use crate::{Error, Result, StreamEvent, StreamEventPayload};

const SEGMENT_SEPARATOR: &[u8] = b"\n\n";
const DATA_MARKER: &str = "data:";

/// Splits buffered bytes into segments and decodes each into at most one event.
///
/// Segments without a `data:` line, with empty content, or with malformed JSON
/// produce nothing; malformed ones are logged.  The trailing incomplete segment
/// stays in the buffer until more bytes arrive.
#[derive(Debug, Default)]
pub struct EventCodec {
    // Bytes of the buffer already searched for a separator.
    scanned: usize,
}

impl EventCodec {
    /// Create a codec with nothing scanned.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_segment(&mut self, src: &mut BytesMut) -> Option<BytesMut> {
        // Back up one byte so a separator straddling two reads is still found.
        let from = self.scanned.saturating_sub(1);
        match src[from..]
            .windows(SEGMENT_SEPARATOR.len())
            .position(|w| w == SEGMENT_SEPARATOR)
        {
            Some(offset) => {
                let end = from + offset;
                let mut segment = src.split_to(end + SEGMENT_SEPARATOR.len());
                segment.truncate(end);
                self.scanned = 0;
                Some(segment)
            }
            None => {
                self.scanned = src.len();
                None
            }
        }
    }
}

impl Decoder for EventCodec {
    type Item = StreamEvent;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<StreamEvent>> {
        while let Some(segment) = self.next_segment(src) {
            let text = String::from_utf8_lossy(&segment);
            match parse_segment(&text) {
                Ok(Some(event)) => {
                    STREAM_EVENTS.click();
                    return Ok(Some(event));
                }
                Ok(None) => {}
                Err(err) => {
                    STREAM_MALFORMED.click();
                    tracing::warn!(error = %err, segment = %text, "skipping malformed stream segment");
                }
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<StreamEvent>> {
        if let Some(event) = self.decode(src)? {
            return Ok(Some(event));
        }
        if !src.is_empty() {
            tracing::debug!(
                bytes = src.len(),
                "discarding unterminated segment at end of stream"
            );
            src.clear();
        }
        self.scanned = 0;
        Ok(None)
    }
}

/// Parse one complete segment (without its separator).
///
/// Returns `Ok(None)` for segments that carry nothing to display: no `data:`
/// line (comments, keep-alives), empty content, or a JSON value other than an
/// object (which has no content).  Returns an error when the `data:` line is
/// not JSON, is `null`, or is an object whose fields have the wrong types.
pub fn parse_segment(segment: &str) -> Result<Option<StreamEvent>> {
    let Some(line) = segment.split('\n').find(|l| l.starts_with(DATA_MARKER)) else {
        tracing::trace!(segment = %segment, "segment has no data line");
        return Ok(None);
    };
    let json = line[DATA_MARKER.len()..].trim_start();
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| Error::malformed_event(format!("invalid event JSON: {e}"), segment))?;
    let payload = match value {
        serde_json::Value::Null => {
            return Err(Error::malformed_event("event payload is null", segment));
        }
        serde_json::Value::Object(_) => serde_json::from_value::<StreamEventPayload>(value)
            .map_err(|e| Error::malformed_event(format!("invalid event payload: {e}"), segment))?,
        _ => StreamEventPayload::default(),
    };
    let event = payload.into_event();
    if event.is_none() {
        STREAM_DROPPED_EMPTY.click();
    }
    Ok(event)
}

/// Decode a byte stream into a stream of events.
///
/// The returned stream is lazy and finite: it ends when the byte stream ends.
/// If the byte stream yields an error, that error is surfaced once as a
/// streaming error and the event stream ends.
///
/// ```
/// use bytes::Bytes;
/// use futures::{StreamExt, stream};
/// use chatfold::{StreamEvent, decode_events};
///
/// # tokio_test::block_on(async {
/// let body = stream::iter(vec![
///     Ok::<_, std::io::Error>(Bytes::from_static(b"data: {\"role\": \"assistant\", ")),
///     Ok(Bytes::from_static(b"\"content\": \"Hi\"}\n\n")),
/// ]);
/// let events: Vec<_> = decode_events(body).collect().await;
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::assistant("Hi"));
/// # });
/// ```
pub fn decode_events<S, E>(byte_stream: S) -> impl Stream<Item = Result<StreamEvent>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = DecodeState {
        stream: byte_stream,
        buffer: BytesMut::new(),
        codec: EventCodec::new(),
        started: Instant::now(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            // Drain every complete segment before reading more.
            match state.codec.decode(&mut state.buffer) {
                Ok(Some(event)) => return Some((Ok(event), state)),
                Ok(None) => {}
                Err(err) => return Some((Err(err), state)),
            }
            if state.done {
                return None;
            }

            match state.stream.next().await {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    state.buffer.extend_from_slice(&bytes);
                }
                Some(Err(e)) => {
                    state.finish();
                    state.buffer.clear();
                    state.codec = EventCodec::new();
                    STREAM_ERRORS.click();
                    let err = Error::streaming(
                        format!("error reading response body: {e}"),
                        Some(Box::new(e)),
                    );
                    return Some((Err(err), state));
                }
                None => {
                    state.finish();
                    return match state.codec.decode_eof(&mut state.buffer) {
                        Ok(Some(event)) => Some((Ok(event), state)),
                        Ok(None) => None,
                        Err(err) => Some((Err(err), state)),
                    };
                }
            }
        }
    })
}

struct DecodeState<S> {
    stream: S,
    buffer: BytesMut,
    codec: EventCodec,
    started: Instant,
    done: bool,
}

impl<S> DecodeState<S> {
    fn finish(&mut self) {
        self.done = true;
        STREAM_DURATION.add(self.started.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageRole;

    type ByteResult = std::result::Result<Bytes, std::io::Error>;

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = ByteResult> + Unpin {
        let parts: Vec<ByteResult> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p)))
            .collect();
        stream::iter(parts)
    }

    async fn collect(parts: &[&[u8]]) -> Vec<Result<StreamEvent>> {
        decode_events(chunks(parts)).collect().await
    }

    async fn collect_ok(parts: &[&[u8]]) -> Vec<StreamEvent> {
        collect(parts)
            .await
            .into_iter()
            .map(|r| r.expect("no errors expected"))
            .collect()
    }

    async fn collect_text(parts: &[&str]) -> Vec<StreamEvent> {
        let parts: Vec<&[u8]> = parts.iter().map(|p| p.as_bytes()).collect();
        collect_ok(&parts).await
    }

    const THREE_EVENTS: &[u8] = b"data: {\"role\": \"assistant\", \"content\": \"He\"}\n\n\
data:{\"content\":\"Hel\"}\n\n\
: keep-alive\n\n\
event: message\ndata: {\"role\": \"USER\", \"content\": \"caf\xc3\xa9 \xe2\x98\x95\"}\n\n";

    #[tokio::test]
    async fn parse_single_event() {
        let events = collect_text(&["data: {\"role\": \"assistant\", \"content\": \"Hi\"}\n\n"]).await;
        assert_eq!(events, vec![StreamEvent::assistant("Hi")]);
    }

    #[tokio::test]
    async fn parse_multiple_events() {
        let events = collect_ok(&[THREE_EVENTS]).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::assistant("He"),
                StreamEvent::assistant("Hel"),
                StreamEvent::user("café ☕"),
            ]
        );
    }

    #[tokio::test]
    async fn fragmented_reads_match_a_single_read() {
        let whole = collect_ok(&[THREE_EVENTS]).await;
        for split in 0..=THREE_EVENTS.len() {
            let (a, b) = THREE_EVENTS.split_at(split);
            let events = collect_ok(&[a, b]).await;
            assert_eq!(events, whole, "split at byte {split}");
        }
        let bytewise: Vec<&[u8]> = THREE_EVENTS.chunks(1).collect();
        assert_eq!(collect_ok(&bytewise).await, whole);
    }

    #[tokio::test]
    async fn multibyte_character_split_across_reads() {
        let data = "data: {\"content\": \"☕\"}\n\n".as_bytes();
        let cut = data.iter().position(|&b| b == 0xe2).unwrap() + 1;
        let events = collect_ok(&[&data[..cut], &data[cut..]]).await;
        assert_eq!(events, vec![StreamEvent::assistant("☕")]);
    }

    #[tokio::test]
    async fn malformed_json_is_skipped() {
        let events = collect_text(&[
            "data: {\"content\": \"one\"}\n\n",
            "data: {not json}\n\n",
            "data: {\"content\": \"two\"}\n\n",
        ])
        .await;
        assert_eq!(
            events,
            vec![StreamEvent::assistant("one"), StreamEvent::assistant("two")]
        );
    }

    #[tokio::test]
    async fn empty_content_and_comment_segments_are_dropped() {
        let events = collect_text(&[
            ": ping\n\n",
            "data: {\"role\": \"system\", \"content\": \"\"}\n\n",
            "data: {\"role\": \"system\"}\n\n",
            "data: {\"role\": \"system\", \"content\": \"notice\"}\n\n",
        ])
        .await;
        assert_eq!(events, vec![StreamEvent::system("notice")]);
        assert_eq!(events[0].role, MessageRole::System);
    }

    #[tokio::test]
    async fn unterminated_trailing_segment_is_discarded() {
        let events = collect_text(&[
            "data: {\"content\": \"done\"}\n\n",
            "data: {\"content\": \"partial\"}",
        ])
        .await;
        assert_eq!(events, vec![StreamEvent::assistant("done")]);
    }

    #[tokio::test]
    async fn empty_stream_yields_nothing() {
        assert!(collect(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn body_error_ends_the_stream() {
        let parts: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"content\": \"a\"}\n\n")),
            Err(std::io::Error::other("connection reset")),
            Ok(Bytes::from_static(b"data: {\"content\": \"b\"}\n\n")),
        ];
        let results: Vec<_> = decode_events(stream::iter(parts)).collect().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), &StreamEvent::assistant("a"));
        let err = results[1].as_ref().unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn codec_keeps_partial_segment_buffered() {
        let mut codec = EventCodec::new();
        let mut buf = BytesMut::from(&b"data: {\"content\": \"x\"}\n"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 23);
        buf.extend_from_slice(b"\ndata: {\"con");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(StreamEvent::assistant("x"))
        );
        assert_eq!(&buf[..], b"data: {\"con");
    }

    #[test]
    fn parse_segment_uses_first_data_line() {
        let event = parse_segment("id: 7\ndata: {\"content\": \"first\"}\ndata: {\"content\": \"second\"}")
            .unwrap();
        assert_eq!(event, Some(StreamEvent::assistant("first")));
    }

    #[test]
    fn parse_segment_reports_malformed_payload() {
        let err = parse_segment("data: [DONE]").unwrap_err();
        assert!(err.is_malformed_event());
        let err = parse_segment("data: null").unwrap_err();
        assert!(err.is_malformed_event());
    }

    #[test]
    fn parse_segment_drops_non_object_payloads() {
        assert_eq!(parse_segment("data: [1]").unwrap(), None);
        assert_eq!(parse_segment("data: \"x\"").unwrap(), None);
        assert_eq!(parse_segment("data: 42").unwrap(), None);
        let err = parse_segment("data: {\"content\": 7}").unwrap_err();
        assert!(err.is_malformed_event());
    }

    #[test]
    fn parse_segment_keeps_padded_roles_as_assistant() {
        let event = parse_segment("data: {\"role\": \" user \", \"content\": \"x\"}").unwrap();
        assert_eq!(event, Some(StreamEvent::assistant("x")));
        let event = parse_segment("data: {\"role\": \"USER\", \"content\": \"x\"}").unwrap();
        assert_eq!(event, Some(StreamEvent::user("x")));
    }

    #[test]
    fn parse_segment_without_data_line() {
        assert_eq!(parse_segment("event: ping").unwrap(), None);
        assert_eq!(parse_segment("").unwrap(), None);
    }
}
