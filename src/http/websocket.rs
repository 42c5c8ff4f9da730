//! WebSocket session handling.
//!
//! # Responsibilities
//! - Define the `StreamHandler` contract for upgraded sessions
//! - Serve `/ws/greetings`: each inbound text frame is a name, answered
//!   by that name's greeting stream as outbound text frames
//!
//! # Data Flow
//! ```text
//! Client ──"Ann"──→ GreetingService::greet("Ann") ─┐
//! Client ──"Bo"───→ GreetingService::greet("Bo")  ─┼─→ SelectAll ──text──→ Client
//! ```
//!
//! # Design Decisions
//! - Inner streams are merged, so greetings for different names interleave
//!   in whatever order their timers fire
//! - Closing the session drops every inner stream and its timer

use futures_util::future::BoxFuture;
use futures_util::stream::{BoxStream, SelectAll, StreamExt};
use futures_util::{FutureExt, SinkExt};

use axum::extract::ws::{Message, WebSocket};

use crate::greeting::{GreetingRequest, GreetingResponse, GreetingService};

/// Serves one upgraded WebSocket session until it ends.
pub trait StreamHandler: Send + Sync + 'static {
    fn handle(&self, socket: WebSocket) -> BoxFuture<'static, Result<(), axum::Error>>;
}

/// Greets every name received on the session.
#[derive(Debug, Clone)]
pub struct GreetingsSocketHandler {
    service: GreetingService,
}

impl GreetingsSocketHandler {
    pub fn new(service: GreetingService) -> Self {
        Self { service }
    }
}

impl StreamHandler for GreetingsSocketHandler {
    fn handle(&self, socket: WebSocket) -> BoxFuture<'static, Result<(), axum::Error>> {
        serve_greetings(socket, self.service.clone()).boxed()
    }
}

async fn serve_greetings(socket: WebSocket, service: GreetingService) -> Result<(), axum::Error> {
    let (mut sink, mut source) = socket.split();
    let mut greetings: SelectAll<BoxStream<'static, GreetingResponse>> = SelectAll::new();

    loop {
        tokio::select! {
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(name))) => {
                    tracing::debug!(name = %name.as_str(), active = greetings.len() + 1, "Greeting stream requested");
                    greetings.push(service.greet(GreetingRequest::new(name.as_str())).boxed());
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
            },
            Some(greeting) = greetings.next(), if !greetings.is_empty() => {
                sink.send(Message::text(greeting.message)).await?;
            }
        }
    }

    tracing::debug!(dropped = greetings.len(), "Greeting session closed");
    Ok(())
}
