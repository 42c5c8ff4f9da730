//! Wire frames for the streaming RPC channel.
//!
//! Each WebSocket text message carries exactly one JSON frame. Every frame
//! names the logical stream it belongs to, which is what lets many
//! request streams share one connection.

use std::fmt::Display;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

/// Identifier of a logical stream, unique per connection.
pub type StreamId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Open a logical stream on `route`.
    Request {
        stream_id: StreamId,
        route: String,
        data: Value,
    },
    /// One element of a response stream.
    Next { stream_id: StreamId, data: Value },
    /// The response stream ended normally.
    Complete { stream_id: StreamId },
    /// The response stream failed; no further frames follow.
    Error { stream_id: StreamId, message: String },
    /// The requester is no longer interested.
    Cancel { stream_id: StreamId },
}

impl Frame {
    pub fn stream_id(&self) -> StreamId {
        match self {
            Frame::Request { stream_id, .. }
            | Frame::Next { stream_id, .. }
            | Frame::Complete { stream_id }
            | Frame::Error { stream_id, .. }
            | Frame::Cancel { stream_id } => *stream_id,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Drain `frames` into a WebSocket sink until either side closes, then
/// close the sink.
pub(crate) async fn write_frames<S, F>(mut sink: S, mut frames: F)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    F: Stream<Item = Frame> + Unpin,
{
    while let Some(frame) = frames.next().await {
        let text = match frame.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(stream_id = frame.stream_id(), error = %e, "Failed to encode frame");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::text(text)).await {
            tracing::debug!(error = %e, "RPC transport closed while writing");
            return;
        }
    }
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_frame_layout() {
        let frame = Frame::Request {
            stream_id: 3,
            route: "greetings".into(),
            data: json!({ "name": "Ann" }),
        };
        let encoded: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(
            encoded,
            json!({ "type": "request", "stream_id": 3, "route": "greetings", "data": { "name": "Ann" } })
        );
    }

    #[test]
    fn decodes_control_frames() {
        assert_eq!(
            Frame::decode(r#"{"type":"cancel","stream_id":7}"#).unwrap(),
            Frame::Cancel { stream_id: 7 }
        );
        let error = Frame::decode(r#"{"type":"error","stream_id":2,"message":"boom"}"#).unwrap();
        assert_eq!(error.stream_id(), 2);
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        assert!(Frame::decode(r#"{"type":"lease","stream_id":1}"#).is_err());
    }
}
