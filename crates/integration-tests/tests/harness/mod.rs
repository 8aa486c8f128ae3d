#![allow(dead_code)]

pub mod config;
pub mod mock_upstream;
pub mod server;

use std::time::Duration;

/// Poll `check` until it holds or `timeout` passes
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    check()
}

/// Payloads of every `data: ` line in a raw SSE body
pub fn parse_sse_data(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(str::to_owned)
        .collect()
}
