// Server-Sent Events decoding for `GET /api/v1/streaming/user`.
//
// Mastodon frames each event as
//
//     event: update
//     data: {"id": "...", ...}
//
// followed by a blank line. `update` and `notification` carry JSON, `delete`
// carries the bare status id, and lines starting with ':' are heartbeats.

use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use super::api::EventStream;
use super::models::{Notification, Status, StreamEvent};

/// Largest event block accepted. A status with a long thread of mentions
/// and media is a few tens of kilobytes; anything near this is not Mastodon.
pub const MAX_PENDING_BYTES: usize = 1024 * 1024;

/// Accumulates raw bytes until complete event blocks are available.
///
/// Bytes are kept undecoded until a block boundary so that a multi-byte
/// character split across two chunks survives intact.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
    /// Bytes already searched for a boundary without finding one.
    scanned: usize,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
    }

    /// Bytes held that don't yet form a complete block.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Pop the next complete block (without its trailing blank line).
    pub fn next_event_block(&mut self) -> Option<String> {
        // Back up one byte: the boundary may straddle the previous scan.
        let start = self.scanned.saturating_sub(1);
        let Some(offset) = self.buffer[start..].windows(2).position(|w| w == b"\n\n") else {
            self.scanned = self.buffer.len();
            return None;
        };
        let boundary = start + offset;

        let rest = self.buffer.split_off(boundary + 2);
        let mut block = std::mem::replace(&mut self.buffer, rest);
        block.truncate(boundary);
        self.scanned = 0;
        Some(String::from_utf8_lossy(&block).into_owned())
    }
}

/// Split one block into its event name and joined data lines.
///
/// Returns `None` for heartbeat/comment-only blocks and blocks without an
/// `event:` field.
pub fn parse_event_block(block: &str) -> Option<(String, String)> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(name) = line.strip_prefix("event:") {
            event = Some(name.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    event.map(|name| (name, data.join("\n")))
}

/// Turn an event name and payload into a `StreamEvent`.
///
/// A payload that doesn't parse is logged and dropped: the stream is allowed
/// to deliver partial payloads and those are not errors.
pub fn decode_event(name: &str, data: &str) -> Option<StreamEvent> {
    match name {
        "update" => match serde_json::from_str::<Status>(data) {
            Ok(status) => Some(StreamEvent::Update(status)),
            Err(e) => {
                warn!(event = name, error = %e, "Skipping unparseable stream payload");
                None
            }
        },
        "notification" => match serde_json::from_str::<Notification>(data) {
            Ok(notification) => Some(StreamEvent::Notification(notification)),
            Err(e) => {
                warn!(event = name, error = %e, "Skipping unparseable stream payload");
                None
            }
        },
        "delete" => {
            let id = data.trim().trim_matches('"');
            if id.is_empty() {
                warn!("Skipping delete event without a status id");
                None
            } else {
                Some(StreamEvent::Delete(id.to_string()))
            }
        }
        other => Some(StreamEvent::Other(other.to_string())),
    }
}

/// Wrap a streaming HTTP response into an `EventStream`.
pub fn event_stream(response: reqwest::Response) -> EventStream {
    decode_stream(response.bytes_stream())
}

/// Decode SSE events from any stream of byte chunks.
pub fn decode_stream<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let stream = async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer = SseBuffer::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(anyhow::Error::new(e).context("User stream transport failed"));
                    return;
                }
            };
            buffer.push_chunk(chunk.as_ref());

            while let Some(block) = buffer.next_event_block() {
                let Some((name, data)) = parse_event_block(&block) else {
                    continue;
                };
                if let Some(event) = decode_event(&name, &data) {
                    yield Ok::<StreamEvent, anyhow::Error>(event);
                }
            }

            if buffer.pending_len() > MAX_PENDING_BYTES {
                yield Err(anyhow::anyhow!(
                    "User stream sent {} bytes without an event boundary",
                    buffer.pending_len()
                ));
                return;
            }
        }

        debug!("User stream closed by server");
        yield Err(anyhow::anyhow!("User stream closed by server"));
    };

    stream.boxed()
}

/// Decode a complete, already-received SSE body.
pub fn decode_all(body: &[u8]) -> Vec<StreamEvent> {
    let mut buffer = SseBuffer::new();
    buffer.push_chunk(body);
    buffer.push_chunk(b"\n\n");

    let mut events = Vec::new();
    while let Some(block) = buffer.next_event_block() {
        if let Some((name, data)) = parse_event_block(&block) {
            events.extend(decode_event(&name, &data));
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_waits_for_blank_line() {
        let mut buffer = SseBuffer::new();
        buffer.push_chunk(b"event: delete\ndata: 10");
        assert!(buffer.next_event_block().is_none());
        buffer.push_chunk(b"9\n\nevent: ");
        assert_eq!(
            buffer.next_event_block().as_deref(),
            Some("event: delete\ndata: 109")
        );
        assert!(buffer.next_event_block().is_none());
    }

    #[test]
    fn boundary_split_across_chunks_is_found() {
        let mut buffer = SseBuffer::new();
        buffer.push_chunk(b"event: delete\ndata: 1\n");
        assert!(buffer.next_event_block().is_none());
        buffer.push_chunk(b"\nevent: delete\ndata: 2\n\n");
        assert_eq!(
            buffer.next_event_block().as_deref(),
            Some("event: delete\ndata: 1")
        );
        assert_eq!(
            buffer.next_event_block().as_deref(),
            Some("event: delete\ndata: 2")
        );
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn unterminated_data_accumulates_without_blocks() {
        let mut buffer = SseBuffer::new();
        buffer.push_chunk(b"event: update\ndata: ");
        for _ in 0..64 {
            buffer.push_chunk(&[b'x'; 1024]);
            assert!(buffer.next_event_block().is_none());
        }
        assert!(buffer.pending_len() > 64 * 1024);
        buffer.push_chunk(b"\n\n");
        assert!(buffer.next_event_block().is_some());
        assert_eq!(buffer.pending_len(), 0);
    }

    #[tokio::test]
    async fn oversized_block_ends_the_stream() {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"event: delete\ndata: 1\n\nevent: update\ndata: ".to_vec()),
            Ok(vec![b'x'; MAX_PENDING_BYTES]),
            Ok(b"\n\nevent: delete\ndata: 2\n\n".to_vec()),
        ];
        let mut events = decode_stream(futures::stream::iter(chunks));

        assert_eq!(
            events.next().await.unwrap().unwrap(),
            StreamEvent::Delete("1".to_string())
        );
        let err = events.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("without an event boundary"), "{err}");
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn transport_error_ends_the_stream() {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"event: delete\ndata: 3\n\n".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out")),
        ];
        let mut events = decode_stream(futures::stream::iter(chunks));

        assert_eq!(
            events.next().await.unwrap().unwrap(),
            StreamEvent::Delete("3".to_string())
        );
        let err = events.next().await.unwrap().unwrap_err();
        assert!(format!("{err:#}").contains("read timed out"));
        assert!(events.next().await.is_none());
    }

    #[test]
    fn buffer_strips_carriage_returns() {
        let mut buffer = SseBuffer::new();
        buffer.push_chunk(b"event: delete\r\ndata: 5\r\n\r\n");
        assert_eq!(
            buffer.next_event_block().as_deref(),
            Some("event: delete\ndata: 5")
        );
    }

    #[test]
    fn buffer_keeps_split_multibyte_characters() {
        let text = "event: update\ndata: 𝘰𝘯\n\n".as_bytes();
        // Split inside the first 4-byte code point.
        let (a, b) = text.split_at(22);
        let mut buffer = SseBuffer::new();
        buffer.push_chunk(a);
        buffer.push_chunk(b);
        assert_eq!(
            buffer.next_event_block().as_deref(),
            Some("event: update\ndata: 𝘰𝘯")
        );
    }

    #[test]
    fn heartbeat_block_has_no_event() {
        assert!(parse_event_block(":thump").is_none());
    }

    #[test]
    fn multi_line_data_is_joined() {
        let parsed = parse_event_block("event: update\ndata: {\"id\":\ndata: \"1\"}");
        assert_eq!(
            parsed,
            Some(("update".to_string(), "{\"id\":\n\"1\"}".to_string()))
        );
    }

    #[test]
    fn decode_delete_event() {
        assert_eq!(
            decode_event("delete", "109876"),
            Some(StreamEvent::Delete("109876".to_string()))
        );
    }

    #[test]
    fn decode_update_event() {
        let data = r#"{
            "id": "42",
            "account": {"id": "7", "acct": "alice@example.social", "username": "alice"},
            "content": "<p>hello</p>",
            "media_attachments": [{"id": "m1", "type": "image", "description": null}],
            "reblog": null,
            "in_reply_to_id": null
        }"#;
        let Some(StreamEvent::Update(status)) = decode_event("update", data) else {
            panic!("expected an update event");
        };
        assert_eq!(status.id, "42");
        assert_eq!(status.account.unwrap().acct, "alice@example.social");
        assert_eq!(status.media_attachments.len(), 1);
        assert!(status.media_attachments[0].description.is_none());
    }

    #[test]
    fn decode_notification_event() {
        let data = r#"{"id": "n1", "type": "follow", "account": {"id": "99", "acct": "bob"}}"#;
        let Some(StreamEvent::Notification(n)) = decode_event("notification", data) else {
            panic!("expected a notification event");
        };
        assert_eq!(n.kind, "follow");
        assert_eq!(n.account.unwrap().id, "99");
        assert!(n.status.is_none());
    }

    #[test]
    fn malformed_update_is_skipped() {
        assert!(decode_event("update", "{not json").is_none());
    }

    #[test]
    fn unknown_event_is_other() {
        assert_eq!(
            decode_event("filters_changed", ""),
            Some(StreamEvent::Other("filters_changed".to_string()))
        );
    }

    #[test]
    fn decode_all_skips_heartbeats() {
        let body = b":thump\n\nevent: delete\ndata: 1\n\n:thump\n\nevent: delete\ndata: 2\n\n";
        let events = decode_all(body);
        assert_eq!(
            events,
            vec![
                StreamEvent::Delete("1".to_string()),
                StreamEvent::Delete("2".to_string()),
            ]
        );
    }
}
