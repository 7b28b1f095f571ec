use std::{error::Error as StdError, sync::Arc};

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::State,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;

use crate::{
    application::{FetchOutcome, Registration, error::HttpError},
    domain::{FetchRequest, ResponseSnapshot},
};

use super::middleware::{log_responses, set_request_context};

const SOURCE: &str = "infra::http::proxy";

/// Names where a proxied response came from (`cache` or `network`).
pub const SOURCE_HEADER: HeaderName = HeaderName::from_static("x-precache-source");

#[derive(Clone)]
pub struct ProxyState {
    pub registration: Arc<Registration>,
    pub max_request_bytes: usize,
}

/// Every method and path is intercepted and handed to the registration.
pub fn build_proxy_router(state: ProxyState) -> Router {
    Router::new()
        .fallback(intercept)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn intercept(State(state): State<ProxyState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let body = match to_bytes(body, state.max_request_bytes).await {
        Ok(body) => body,
        Err(err) if exceeds_limit(&err) => {
            return HttpError::from_error(
                SOURCE,
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large",
                &err,
            )
            .into_response();
        }
        Err(err) => {
            return HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
                &err,
            )
            .into_response();
        }
    };

    let target = parts
        .uri
        .path_and_query()
        .map(|target| target.as_str())
        .unwrap_or("/");

    let mut fetch_request = FetchRequest::new(parts.method, target);
    fetch_request.headers = parts.headers;
    fetch_request.body = body;

    match state.registration.handle_fetch(fetch_request).await {
        Ok(outcome) => outcome_response(outcome),
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn outcome_response(outcome: FetchOutcome) -> Response {
    let mut response = build_response(outcome.response);
    response.headers_mut().insert(
        SOURCE_HEADER,
        HeaderValue::from_static(outcome.source.as_str()),
    );
    response
}

/// True when reading the body stopped at the configured size limit.
fn exceeds_limit(err: &axum::Error) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(error) = current {
        if error.is::<LengthLimitError>() {
            return true;
        }
        current = error.source();
    }
    false
}

/// Build a response from a buffered snapshot.
fn build_response(snapshot: ResponseSnapshot) -> Response {
    let Ok(status) = StatusCode::from_u16(snapshot.status) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let mut response = Response::new(Body::from(snapshot.body));
    *response.status_mut() = status;
    *response.headers_mut() = snapshot.headers;
    response
}

#[cfg(test)]
mod tests {
    use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};

    use super::*;

    #[test]
    fn build_response_copies_status_headers_and_body() {
        let snapshot = ResponseSnapshot::new(203)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("image/png"))
            .with_body("png");

        let response = build_response(snapshot);
        assert_eq!(response.status(), StatusCode::NON_AUTHORITATIVE_INFORMATION);
        assert_eq!(
            response.headers().get(CONTENT_TYPE),
            Some(&HeaderValue::from_static("image/png"))
        );
    }

    #[test]
    fn build_response_keeps_non_ascii_header_values() {
        let disposition = HeaderValue::from_bytes("attachment; filename=\"café.txt\"".as_bytes())
            .expect("non-ascii header value");
        let snapshot = ResponseSnapshot::new(200)
            .with_header(CONTENT_DISPOSITION, disposition.clone())
            .with_body("data");

        let response = build_response(snapshot);
        assert_eq!(response.headers().get(CONTENT_DISPOSITION), Some(&disposition));
    }

    #[test]
    fn invalid_status_falls_back_to_internal_error() {
        let response = build_response(ResponseSnapshot::new(42));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
