use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use crate::limiter::{RateLimitError, RequestLimiter};

/// Rate limiting middleware using an Arc-wrapped limiter
pub async fn rate_limit_middleware(limiter: Arc<RequestLimiter>, request: Request, next: Next) -> Response {
    if let Err(e) = limiter.check_global() {
        return rate_limit_response(&e);
    }

    if let Some(ip) = extract_client_ip(&request)
        && let Err(e) = limiter.check_ip(&ip)
    {
        tracing::debug!(%ip, "per-ip rate limit exceeded");
        return rate_limit_response(&e);
    }

    next.run(request).await
}

/// Client address from proxy headers, falling back to the peer address
fn extract_client_ip(request: &Request) -> Option<String> {
    if let Some(forwarded) = request.headers().get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first) = val.split(',').next()
        && !first.trim().is_empty()
    {
        return Some(first.trim().to_owned());
    }

    if let Some(real_ip) = request.headers().get("x-real-ip")
        && let Ok(val) = real_ip.to_str()
    {
        return Some(val.trim().to_owned());
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

fn rate_limit_response(error: &RateLimitError) -> Response {
    match error {
        RateLimitError::Exceeded { retry_after } => {
            let body = serde_json::json!({
                "error": {
                    "type": "rate_limited",
                    "message": format!("rate limit exceeded, retry after {retry_after}s"),
                }
            });

            let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();

            if let Ok(val) = retry_after.to_string().parse() {
                response.headers_mut().insert(http::header::RETRY_AFTER, val);
            }

            response
        }
        RateLimitError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "rate limiter error").into_response(),
    }
}
