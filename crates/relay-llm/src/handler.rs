//! Axum route for `POST /chat/stream`

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::{Stream, StreamExt};
use relay_core::{ChatRequest, HttpError};

use crate::error::RelayError;
use crate::relay::{RelayState, RelayStream};

/// Build the relay router
pub fn relay_router(state: RelayState) -> Router {
    Router::new()
        .route("/chat/stream", routing::post(chat_stream))
        .with_state(state)
}

/// Handle `POST /chat/stream`
async fn chat_stream(State(state): State<RelayState>, payload: Result<Json<ChatRequest>, JsonRejection>) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return error_body(StatusCode::PAYLOAD_TOO_LARGE, "invalid_request_error", &rejection.body_text());
        }
        Err(rejection) => return error_response(&RelayError::Validation(rejection.body_text())),
    };

    match state.open_stream(request).await {
        Ok(stream) => sse_response(stream).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Re-emit relay events as `data: ` frames
fn sse_response(stream: RelayStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = stream.map(|event| Ok(Event::default().data(event.to_payload())));
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Render a relay error as a JSON error response
fn error_response(error: &RelayError) -> Response {
    let mut response = error_body(error.status_code(), error.error_type(), &error.client_message());

    if matches!(error, RelayError::Overloaded) {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    }

    response
}

fn error_body(status: StatusCode, error_type: &str, message: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "type": error_type,
            "message": message,
        }
    });

    (status, Json(body)).into_response()
}
