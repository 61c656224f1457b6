//! Skips mock-server tests in sandboxes that forbid binding localhost.
//!
//! Set `THREADCAST_REQUIRE_SOCKET_TESTS=1` to turn a skip into a failure.

use std::net::TcpListener;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "THREADCAST_REQUIRE_SOCKET_TESTS";

fn sockets_required() -> bool {
    std::env::var(REQUIRE_ENV).is_ok_and(|value| {
        matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
    })
}

/// Starts a mock server, or returns `None` when no local socket can be bound.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if let Err(error) = TcpListener::bind("127.0.0.1:0") {
        assert!(
            !sockets_required(),
            "cannot bind a localhost socket ({error}) and {REQUIRE_ENV} is set"
        );
        eprintln!("[mock-server] skipping: cannot bind a localhost socket ({error})");
        return None;
    }
    Some(MockServer::start().await)
}
