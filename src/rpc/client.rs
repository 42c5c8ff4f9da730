//! Requester side of the streaming RPC channel.
//!
//! # Responsibilities
//! - Open the single WebSocket connection to the remote endpoint
//! - Allocate stream ids and route incoming frames to their consumer
//! - Send `cancel` when a consumer drops its stream early
//! - Fail every open stream when the connection goes away
//!
//! # Design Decisions
//! - One writer task owns the sink; everyone else queues frames to it
//! - The reader task holds only a weak reference, so dropping the last
//!   handle closes the connection
//! - No reconnect: once closed, every request fails with `Disconnected`
//! - Each stream's inbox is bounded; a full inbox holds the reader, which
//!   pushes back on the responder through the socket

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::stream::{SplitStream, Stream, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::observability::metrics;
use crate::rpc::error::RpcError;
use crate::rpc::frame::{write_frames, Frame, StreamId};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
/// Responses buffered per logical stream before the reader waits.
const INBOX_BUFFER: usize = 32;

type Inbox = mpsc::Sender<Result<Value, RpcError>>;

struct Shared {
    addr: String,
    outbound: mpsc::UnboundedSender<Frame>,
    streams: DashMap<StreamId, Inbox>,
    next_id: AtomicU32,
    closed: AtomicBool,
}

impl Shared {
    async fn dispatch(&self, frame: Frame) {
        match frame {
            Frame::Next { stream_id, data } => {
                // Clone out of the map so no shard lock is held while waiting.
                let inbox = self.streams.get(&stream_id).map(|entry| entry.clone());
                if let Some(inbox) = inbox {
                    let _ = inbox.send(Ok(data)).await;
                }
            }
            Frame::Complete { stream_id } => {
                self.streams.remove(&stream_id);
            }
            Frame::Error { stream_id, message } => {
                if let Some((_, inbox)) = self.streams.remove(&stream_id) {
                    deliver_last(inbox, Err(RpcError::Remote(message)));
                }
            }
            other => {
                tracing::debug!(stream_id = other.stream_id(), "Ignoring unexpected frame from responder");
            }
        }
    }

    fn fail_all(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let ids: Vec<StreamId> = self.streams.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, inbox)) = self.streams.remove(&id) {
                deliver_last(inbox, Err(RpcError::Disconnected));
            }
        }
    }
}

/// Queue a stream's final item without holding up the caller when the
/// inbox is full.
fn deliver_last(inbox: Inbox, item: Result<Value, RpcError>) {
    if let Err(TrySendError::Full(item)) = inbox.try_send(item) {
        tokio::spawn(async move {
            let _ = inbox.send(item).await;
        });
    }
}

/// A persistent connection multiplexing many logical request streams.
#[derive(Clone)]
pub struct RpcConnection {
    shared: Arc<Shared>,
}

impl RpcConnection {
    /// Dial `addr` (`host:port`). Failing here is meant to abort startup.
    pub async fn connect(addr: &str, connect_timeout: Duration) -> Result<Self, RpcError> {
        let url = format!("ws://{addr}/");
        let (socket, _) = tokio::time::timeout(connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| RpcError::Connect {
                addr: addr.to_string(),
                reason: format!("timed out after {connect_timeout:?}"),
            })?
            .map_err(|e| RpcError::Connect {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;

        let (sink, source) = socket.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            addr: addr.to_string(),
            outbound,
            streams: DashMap::new(),
            next_id: AtomicU32::new(1),
            closed: AtomicBool::new(false),
        });

        tokio::spawn(write_frames(sink, UnboundedReceiverStream::new(outbound_rx)));
        tokio::spawn(read_frames(source, Arc::downgrade(&shared)));

        tracing::info!(address = %addr, "RPC connection established");
        Ok(Self { shared })
    }

    /// Whether the underlying connection is still usable.
    pub fn is_connected(&self) -> bool {
        !self.shared.closed.load(Ordering::SeqCst)
    }

    /// Open a logical stream on `route` carrying `data` as its request.
    pub fn request_stream(&self, route: &str, data: Value) -> RouteStream {
        let stream_id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (inbox, rx) = mpsc::channel(INBOX_BUFFER);
        self.shared.streams.insert(stream_id, inbox);

        let request = Frame::Request {
            stream_id,
            route: route.to_string(),
            data,
        };
        // `fail_all` marks the connection closed before draining, so a
        // stream registered concurrently is caught by one side or the other.
        if self.shared.closed.load(Ordering::SeqCst) || self.shared.outbound.send(request).is_err() {
            if let Some((_, inbox)) = self.shared.streams.remove(&stream_id) {
                deliver_last(inbox, Err(RpcError::Disconnected));
            }
        } else {
            tracing::debug!(stream_id, route, address = %self.shared.addr, "Logical stream opened");
            metrics::record_rpc_stream(route, "opened");
        }

        RouteStream {
            stream_id,
            route: route.to_string(),
            rx,
            shared: Arc::clone(&self.shared),
            outcome: None,
        }
    }
}

async fn read_frames(mut source: SplitStream<Socket>, shared: Weak<Shared>) {
    while let Some(message) = source.next().await {
        let Some(state) = shared.upgrade() else {
            break;
        };
        match message {
            Ok(Message::Text(text)) => match Frame::decode(text.as_str()) {
                Ok(frame) => state.dispatch(frame).await,
                Err(e) => tracing::warn!(error = %e, "Dropping undecodable RPC frame"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "RPC connection failed");
                break;
            }
        }
    }

    if let Some(state) = shared.upgrade() {
        tracing::warn!(address = %state.addr, "RPC connection closed by remote");
        state.fail_all();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Failed => "error",
        }
    }
}

/// Responses of one logical stream. Dropping it before the end cancels
/// the stream on the remote side.
pub struct RouteStream {
    stream_id: StreamId,
    route: String,
    rx: mpsc::Receiver<Result<Value, RpcError>>,
    shared: Arc<Shared>,
    outcome: Option<Outcome>,
}

impl RouteStream {
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }
}

impl Stream for RouteStream {
    type Item = Result<Value, RpcError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.outcome.is_some() {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(None) => {
                self.outcome = Some(Outcome::Completed);
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                self.outcome = Some(Outcome::Failed);
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }
}

impl Drop for RouteStream {
    fn drop(&mut self) {
        if let Some(outcome) = self.outcome {
            metrics::record_rpc_stream(&self.route, outcome.as_str());
            return;
        }
        if self.shared.streams.remove(&self.stream_id).is_some() {
            let _ = self.shared.outbound.send(Frame::Cancel {
                stream_id: self.stream_id,
            });
            tracing::debug!(stream_id = self.stream_id, route = %self.route, "Logical stream cancelled");
            metrics::record_rpc_stream(&self.route, "cancelled");
        }
    }
}
