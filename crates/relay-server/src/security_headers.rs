use anyhow::Context;
use axum::Router;
use http::HeaderValue;
use http::header::{CONTENT_SECURITY_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS};
use relay_config::SecurityHeadersConfig;
use tower_http::set_header::SetResponseHeaderLayer;

/// Wrap the router so every response carries the hardening headers
///
/// Handlers that set one of these headers themselves keep their value.
pub fn apply(router: Router, config: &SecurityHeadersConfig) -> anyhow::Result<Router> {
    let policy = HeaderValue::from_str(&config.content_security_policy)
        .context("invalid server.security_headers.content_security_policy")?;
    let frame_options =
        HeaderValue::from_str(&config.frame_options).context("invalid server.security_headers.frame_options")?;

    Ok(router
        .layer(SetResponseHeaderLayer::if_not_present(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(X_FRAME_OPTIONS, frame_options))
        .layer(SetResponseHeaderLayer::if_not_present(CONTENT_SECURITY_POLICY, policy)))
}
