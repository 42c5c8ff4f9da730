//! HTTP client for the reservation service frontage.
//!
//! The frontage answers `GET /reservations` with newline-delimited JSON;
//! this client turns the body into a lazy stream of [`Reservation`]s as the
//! bytes arrive.

use std::time::Duration;

use axum::body::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use thiserror::Error;
use url::Url;

use crate::reservations::model::Reservation;

/// The reservation service could not deliver its records.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("reservation service unavailable: {0}")]
    Unavailable(#[source] reqwest::Error),

    #[error("reservation service answered {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed reservation record: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid reservation service URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone)]
pub struct ReservationClient {
    http: reqwest::Client,
    reservations_url: Url,
}

impl ReservationClient {
    /// Build a client for the service rooted at `base_url`.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, ClientError> {
        let reservations_url = Url::parse(base_url)?.join("/reservations")?;
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(ClientError::Unavailable)?;
        Ok(Self {
            http,
            reservations_url,
        })
    }

    /// Stream every reservation held by the service.
    pub fn get_all_reservations(&self) -> BoxStream<'static, Result<Reservation, ClientError>> {
        tracing::debug!(url = %self.reservations_url, "Fetching reservations");
        let request = self.http.get(self.reservations_url.clone());

        stream::once(async move {
            let response = request.send().await.map_err(ClientError::Unavailable)?;
            let status = response.status();
            if !status.is_success() {
                return Err(ClientError::Status(status));
            }
            Ok(decode_lines(response.bytes_stream().boxed()))
        })
        .try_flatten()
        .boxed()
    }
}

struct LineReader {
    source: BoxStream<'static, reqwest::Result<Bytes>>,
    buffer: Vec<u8>,
    exhausted: bool,
}

/// Split a byte stream on `\n` and decode each non-blank line as JSON.
fn decode_lines(
    source: BoxStream<'static, reqwest::Result<Bytes>>,
) -> BoxStream<'static, Result<Reservation, ClientError>> {
    let reader = LineReader {
        source,
        buffer: Vec::new(),
        exhausted: false,
    };

    stream::unfold(reader, |mut reader| async move {
        loop {
            if let Some(pos) = reader.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = reader.buffer.drain(..=pos).collect();
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                return Some((serde_json::from_slice(&line).map_err(ClientError::from), reader));
            }

            if reader.exhausted {
                if reader.buffer.iter().all(u8::is_ascii_whitespace) {
                    return None;
                }
                let line = std::mem::take(&mut reader.buffer);
                return Some((serde_json::from_slice(&line).map_err(ClientError::from), reader));
            }

            match reader.source.next().await {
                Some(Ok(chunk)) => reader.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    reader.exhausted = true;
                    reader.buffer.clear();
                    return Some((Err(ClientError::Unavailable(e)), reader));
                }
                None => reader.exhausted = true,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&'static str]) -> BoxStream<'static, reqwest::Result<Bytes>> {
        let owned: Vec<reqwest::Result<Bytes>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect();
        stream::iter(owned).boxed()
    }

    #[tokio::test]
    async fn decodes_records_split_across_chunks() {
        let source = chunks(&[
            "{\"id\":1,\"na",
            "me\":\"Dhaval\"}\n{\"id\":2,",
            "\"name\":\"Bhavin\"}\n\n",
            "{\"id\":null,\"name\":\"Jigar\"}",
        ]);

        let records: Vec<_> = decode_lines(source).try_collect().await.unwrap();
        assert_eq!(
            records,
            vec![
                Reservation { id: Some(1), name: "Dhaval".into() },
                Reservation { id: Some(2), name: "Bhavin".into() },
                Reservation { id: None, name: "Jigar".into() },
            ]
        );
    }

    #[tokio::test]
    async fn malformed_line_is_an_error() {
        let source = chunks(&["{\"id\":1,\"name\":\"Sid\"}\nnot json\n"]);
        let results: Vec<_> = decode_lines(source).collect().await;
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ClientError::Decode(_))));
    }

    #[tokio::test]
    async fn unreachable_service_fails_the_stream() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let client = ReservationClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let results: Vec<_> = client.get_all_reservations().collect().await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ClientError::Unavailable(_))));
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(matches!(
            ReservationClient::new("not a url", Duration::from_secs(1)),
            Err(ClientError::Url(_))
        ));
    }
}
