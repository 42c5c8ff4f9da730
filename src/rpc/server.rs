//! Responder side of the streaming RPC channel.
//!
//! # Responsibilities
//! - Accept WebSocket connections and decode request frames
//! - Look up the handler registered for each route
//! - Run one emitter task per logical stream, tagging frames with its id
//! - Abort emitters on `cancel` or when their connection goes away

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::{BoxStream, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::{AbortHandle, JoinSet};
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use crate::observability::metrics;
use crate::rpc::error::RpcError;
use crate::rpc::frame::{write_frames, Frame, StreamId};

const OUTBOUND_BUFFER: usize = 64;

/// Response payloads of one logical stream.
pub type PayloadStream = BoxStream<'static, Result<Value, RpcError>>;

/// Serves one named route.
pub trait RouteHandler: Send + Sync + 'static {
    /// Turn a request payload into its response stream.
    fn handle(&self, data: Value) -> Result<PayloadStream, RpcError>;
}

type Routes = HashMap<String, Arc<dyn RouteHandler>>;

/// Streaming RPC endpoint.
#[derive(Default)]
pub struct RpcServer {
    routes: Routes,
}

impl RpcServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`.
    pub fn route(mut self, name: impl Into<String>, handler: impl RouteHandler) -> Self {
        self.routes.insert(name.into(), Arc::new(handler));
        self
    }

    /// Accept connections until shutdown is signalled, then drop every
    /// connection along with its emitters.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = ?self.routes.keys().collect::<Vec<_>>(),
            "RPC server listening"
        );

        let routes = Arc::new(self.routes);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(serve_connection(stream, peer, Arc::clone(&routes)));
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to accept RPC connection"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = shutdown.recv() => {
                    tracing::info!("RPC server received shutdown signal");
                    break;
                }
            }
        }

        connections.shutdown().await;
        tracing::info!("RPC server stopped");
        Ok(())
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, routes: Arc<Routes>) {
    let socket = match accept_async(stream).await {
        Ok(socket) => socket,
        Err(e) => {
            tracing::warn!(peer = %peer, error = %e, "RPC handshake failed");
            return;
        }
    };
    tracing::info!(peer = %peer, "RPC connection accepted");

    let (sink, mut source) = socket.split();
    let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
    let writer = tokio::spawn(write_frames(sink, ReceiverStream::new(outbound_rx)));

    let mut emitters: JoinSet<StreamId> = JoinSet::new();
    let mut active: HashMap<StreamId, AbortHandle> = HashMap::new();

    loop {
        tokio::select! {
            message = source.next() => {
                let Some(message) = message else { break };
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(peer = %peer, error = %e, "RPC connection failed");
                        break;
                    }
                };

                match Frame::decode(text.as_str()) {
                    Ok(Frame::Request { stream_id, route, data }) => {
                        let opened = match routes.get(&route) {
                            Some(handler) => handler.handle(data),
                            None => Err(RpcError::UnknownRoute(route.clone())),
                        };
                        match opened {
                            Ok(payloads) => {
                                tracing::debug!(peer = %peer, stream_id, route = %route, "Stream requested");
                                let handle = emitters.spawn(emit(stream_id, route, payloads, outbound.clone()));
                                // A reused id belongs to the newest request only.
                                if let Some(previous) = active.insert(stream_id, handle) {
                                    previous.abort();
                                    tracing::debug!(peer = %peer, stream_id, "Replaced live stream with reused id");
                                }
                            }
                            Err(e) => {
                                tracing::warn!(peer = %peer, stream_id, error = %e, "Rejecting stream");
                                let _ = outbound.send(Frame::Error { stream_id, message: e.to_string() }).await;
                            }
                        }
                    }
                    Ok(Frame::Cancel { stream_id }) => {
                        if let Some(handle) = active.remove(&stream_id) {
                            handle.abort();
                            tracing::debug!(peer = %peer, stream_id, "Stream cancelled by requester");
                        }
                    }
                    Ok(other) => {
                        tracing::debug!(peer = %peer, stream_id = other.stream_id(), "Ignoring unexpected frame from requester");
                    }
                    Err(e) => tracing::warn!(peer = %peer, error = %e, "Dropping undecodable RPC frame"),
                }
            }
            Some(finished) = emitters.join_next(), if !emitters.is_empty() => {
                if let Ok(stream_id) = finished {
                    if active.get(&stream_id).is_some_and(AbortHandle::is_finished) {
                        active.remove(&stream_id);
                    }
                }
            }
        }
    }

    // Dropping the emitters stops every generator still feeding this peer.
    emitters.shutdown().await;
    drop(outbound);
    let _ = writer.await;
    tracing::info!(peer = %peer, "RPC connection closed");
}

async fn emit(
    stream_id: StreamId,
    route: String,
    mut payloads: PayloadStream,
    outbound: mpsc::Sender<Frame>,
) -> StreamId {
    metrics::record_rpc_stream(&route, "served");

    while let Some(item) = payloads.next().await {
        let frame = match item {
            Ok(data) => Frame::Next { stream_id, data },
            Err(e) => {
                let _ = outbound
                    .send(Frame::Error {
                        stream_id,
                        message: e.to_string(),
                    })
                    .await;
                return stream_id;
            }
        };
        if outbound.send(frame).await.is_err() {
            return stream_id;
        }
    }

    let _ = outbound.send(Frame::Complete { stream_id }).await;
    stream_id
}
