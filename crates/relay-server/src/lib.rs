//! HTTP surface of the relay
//!
//! Mounts the relay route behind the configured body limit, request
//! tracing, CORS, rate limiting, and security headers, plus an optional
//! health route.

mod cors;
mod health;
mod limiter;
mod rate_limit;
mod security_headers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use relay_config::Config;
use relay_llm::RelayState;
use tower_http::trace::TraceLayer;

pub use limiter::{RateLimitError, RequestLimiter};

/// Address used when `server.listen_address` is unset
const DEFAULT_LISTEN_ADDRESS: ([u8; 4], u16) = ([0, 0, 0, 0], 3001);

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream client or rate limiter cannot be
    /// constructed
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let relay_state = RelayState::from_config(config)?;
        Self::with_relay_state(config, relay_state)
    }

    /// Build the server around an existing relay state
    ///
    /// # Errors
    ///
    /// Returns an error if the rate limiter cannot be constructed or a
    /// configured security header value is invalid
    pub fn with_relay_state(config: &Config, relay_state: RelayState) -> anyhow::Result<Self> {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(DEFAULT_LISTEN_ADDRESS));

        let mut relay_routes = relay_llm::relay_router(relay_state);

        // Rate limiting covers the relay only, never the health check
        if let Some(ref rl_config) = config.server.rate_limit {
            let limiter = Arc::new(RequestLimiter::new(rl_config)?);
            relay_routes = relay_routes.layer(axum::middleware::from_fn(move |req, next| {
                let limiter = Arc::clone(&limiter);
                async move { rate_limit::rate_limit_middleware(limiter, req, next).await }
            }));
        }

        let mut app = Router::new();

        if config.server.health.enabled {
            app = app.route(&config.server.health.path, axum::routing::get(health::health_handler));
        }

        app = app.merge(relay_routes);

        // Apply middleware layers (innermost first)
        app = app.layer(DefaultBodyLimit::max(config.server.body_limit));
        app = app.layer(TraceLayer::new_for_http());

        if let Some(ref cors_config) = config.server.cors {
            app = app.layer(cors::cors_layer(cors_config));
        }

        if config.server.security_headers.enabled {
            app = security_headers::apply(app, &config.server.security_headers)?;
        }

        Ok(Self {
            router: app,
            listen_address,
        })
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered. Open streams are
    /// allowed to finish before the call returns.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(
            listener,
            self.router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            tracing::info!("graceful shutdown initiated");
        })
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use super::*;

    fn config(extra: &str) -> Config {
        let raw = format!("{extra}\n[upstream]\napi_key = \"sk-test\"\nbase_url = \"http://127.0.0.1:9/v1\"\n");
        Config::parse(&raw).unwrap()
    }

    fn router(extra: &str) -> Router {
        Server::new(&config(extra)).unwrap().into_router()
    }

    fn chat(body: &str, ip: &str) -> Request<Body> {
        Request::post("/chat/stream")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let response = router("")
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn health_can_be_moved_or_disabled() {
        let moved = router("[server.health]\npath = \"/healthz\"");
        let response = moved
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let disabled = router("[server.health]\nenabled = false");
        let response = disabled
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let app = router("[server]\nbody_limit = 64");
        let message = "x".repeat(256);

        let response = app
            .oneshot(chat(&format!(r#"{{"message":"{message}"}}"#), "10.0.0.1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn cors_preflight_is_answered() {
        let app = router("[server.cors]\norigins = [\"https://app.example.com\"]\nmethods = [\"GET\", \"POST\"]");

        let preflight = Request::builder()
            .method("OPTIONS")
            .uri("/chat/stream")
            .header(header::ORIGIN, "https://app.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(preflight).await.unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );
    }

    #[tokio::test]
    async fn responses_carry_security_headers() {
        let response = router("")
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert_eq!(
            headers[header::CONTENT_SECURITY_POLICY],
            relay_config::DEFAULT_CONTENT_SECURITY_POLICY
        );

        // Error responses from the relay route are covered too
        let rejected = router("").oneshot(chat(r#"{"message":""}"#, "10.0.0.1")).await.unwrap();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        assert_eq!(rejected.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    }

    #[tokio::test]
    async fn security_headers_follow_config() {
        let custom = router(
            "[server.security_headers]\nframe_options = \"DENY\"\ncontent_security_policy = \"default-src 'none'\"",
        );
        let response = custom
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(response.headers()[header::CONTENT_SECURITY_POLICY], "default-src 'none'");

        let disabled = router("[server.security_headers]\nenabled = false");
        let response = disabled
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(!response.headers().contains_key(header::X_CONTENT_TYPE_OPTIONS));
        assert!(!response.headers().contains_key(header::CONTENT_SECURITY_POLICY));
    }

    #[test]
    fn invalid_header_value_fails_construction() {
        let result = Server::new(&config("[server.security_headers]\nframe_options = \"bad\\u0001value\""));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn per_ip_limit_rejects_excess_requests() {
        let app = router("[server.rate_limit]\nper_ip = { requests = 2, window = \"1m\" }");

        // Blank messages fail validation without touching the upstream
        for _ in 0..2 {
            let response = app.clone().oneshot(chat(r#"{"message":""}"#, "10.0.0.1")).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        let response = app.clone().oneshot(chat(r#"{"message":""}"#, "10.0.0.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));

        let other = app.clone().oneshot(chat(r#"{"message":""}"#, "10.0.0.2")).await.unwrap();
        assert_eq!(other.status(), StatusCode::BAD_REQUEST);

        let health = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }
}
