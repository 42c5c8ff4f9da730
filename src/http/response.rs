//! Streaming response bodies.
//!
//! # Responsibilities
//! - Frame a stream of records as newline-delimited JSON
//! - Frame a stream of strings as plain-text lines
//!
//! # Design Decisions
//! - Bodies are streamed; each element is flushed as it is produced
//! - A source error aborts the body mid-stream, which the client sees as a
//!   truncated response

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::BoxError;
use futures_util::stream::{Stream, StreamExt};
use serde::Serialize;

pub const NDJSON: &str = "application/x-ndjson";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// One JSON document per line.
pub fn ndjson<S, T, E>(records: S) -> Response
where
    S: Stream<Item = Result<T, E>> + Send + 'static,
    T: Serialize,
    E: Into<BoxError>,
{
    let lines = records.map(|record| -> Result<String, BoxError> {
        let record = match record {
            Ok(record) => record,
            Err(e) => return Err(e.into()),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        Ok(line)
    });
    with_content_type(Body::from_stream(lines), NDJSON)
}

/// One string per line.
pub fn text_lines<S>(lines: S) -> Response
where
    S: Stream<Item = String> + Send + 'static,
{
    let lines = lines.map(|line| Ok::<_, Infallible>(format!("{line}\n")));
    with_content_type(Body::from_stream(lines), TEXT_PLAIN)
}

fn with_content_type(body: Body, content_type: &'static str) -> Response {
    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use serde_json::json;

    async fn body_text(response: Response) -> Result<String, axum::Error> {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await?;
        Ok(String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn ndjson_writes_one_record_per_line() {
        let records = stream::iter(vec![
            Ok::<_, std::io::Error>(json!({ "id": 1, "name": "Ann" })),
            Ok(json!({ "id": 2, "name": "Bo" })),
        ]);
        let response = ndjson(records);
        assert_eq!(response.headers()[header::CONTENT_TYPE], NDJSON);
        assert_eq!(
            body_text(response).await.unwrap(),
            "{\"id\":1,\"name\":\"Ann\"}\n{\"id\":2,\"name\":\"Bo\"}\n"
        );
    }

    #[tokio::test]
    async fn ndjson_source_error_aborts_body() {
        let records = stream::iter(vec![
            Ok(json!(1)),
            Err(std::io::Error::other("store down")),
        ]);
        assert!(body_text(ndjson(records)).await.is_err());
    }

    #[tokio::test]
    async fn text_lines_terminates_each_line() {
        let response = text_lines(stream::iter(vec!["Dhaval".to_string(), "Bhavin".to_string()]));
        assert_eq!(response.headers()[header::CONTENT_TYPE], TEXT_PLAIN);
        assert_eq!(body_text(response).await.unwrap(), "Dhaval\nBhavin\n");
    }
}
