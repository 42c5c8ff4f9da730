//! Greetings over the streaming RPC channel.
//!
//! `GreetingsRoute` exposes the generator on the reservation service;
//! `GreetingClient` is the gateway's typed view of that route.

use std::time::Duration;

use futures_util::stream::{BoxStream, StreamExt};
use serde_json::Value;

use crate::config::schema::RpcEndpointConfig;
use crate::greeting::service::GreetingService;
use crate::greeting::types::{GreetingRequest, GreetingResponse};
use crate::rpc::{PayloadStream, RouteHandler, RpcConnection, RpcError};

/// Route name the greeting stream is registered under.
pub const GREETINGS_ROUTE: &str = "greetings";

/// Server-side handler for [`GREETINGS_ROUTE`].
#[derive(Debug, Clone, Default)]
pub struct GreetingsRoute {
    service: GreetingService,
}

impl GreetingsRoute {
    pub fn new(service: GreetingService) -> Self {
        Self { service }
    }
}

impl RouteHandler for GreetingsRoute {
    fn handle(&self, data: Value) -> Result<PayloadStream, RpcError> {
        let request: GreetingRequest = serde_json::from_value(data)?;
        Ok(self
            .service
            .greet(request)
            .map(|response| serde_json::to_value(response).map_err(RpcError::from))
            .boxed())
    }
}

/// Requester for the remote greeting stream.
#[derive(Clone)]
pub struct GreetingClient {
    connection: RpcConnection,
}

impl GreetingClient {
    pub fn new(connection: RpcConnection) -> Self {
        Self { connection }
    }

    /// Dial the endpoint described by `config`.
    pub async fn connect(config: &RpcEndpointConfig) -> Result<Self, RpcError> {
        let connection = RpcConnection::connect(
            &config.address(),
            Duration::from_secs(config.connect_timeout_secs),
        )
        .await?;
        Ok(Self::new(connection))
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Greetings for `request.name`, one per remote interval, until the
    /// returned stream is dropped or the connection fails.
    pub fn greet(
        &self,
        request: GreetingRequest,
    ) -> BoxStream<'static, Result<GreetingResponse, RpcError>> {
        let data = match serde_json::to_value(&request) {
            Ok(data) => data,
            Err(e) => return futures_util::stream::once(async move { Err(e.into()) }).boxed(),
        };
        self.connection
            .request_stream(GREETINGS_ROUTE, data)
            .map(|item| {
                item.and_then(|value| Ok(serde_json::from_value::<GreetingResponse>(value)?))
            })
            .boxed()
    }
}
