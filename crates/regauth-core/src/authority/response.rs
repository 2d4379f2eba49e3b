//! JSON response rendering shared by successes and errors.

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// The only media type accepted and produced.
pub const APPLICATION_JSON: &str = "application/json";

/// Renders `body` as pretty-printed JSON with the given status.
///
/// If the body cannot be serialized the failure is logged and the status is
/// still sent, with an empty body. There is nothing more the client can be
/// told at that point.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    let bytes = match serde_json::to_vec_pretty(body) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(
                status = status.as_u16(),
                error = %e,
                "marshaling response failed"
            );
            Vec::new()
        },
    };

    (
        status,
        [(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON))],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::ser::Error as _;

    use super::*;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refusing to serialize"))
        }
    }

    #[test]
    fn test_sets_status_and_content_type() {
        let body: BTreeMap<&str, &str> = BTreeMap::from([("k", "v")]);
        let response = json_response(StatusCode::CREATED, &body);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            APPLICATION_JSON
        );
    }

    #[test]
    fn test_serialization_failure_keeps_status() {
        let response = json_response(StatusCode::OK, &Unserializable);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            APPLICATION_JSON
        );
    }
}
