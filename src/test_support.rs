//! Shared helpers for unit tests.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

/// Returns true when the environment demands socket-bound tests run.
#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var("LEGISFETCH_REQUIRE_SOCKET_TESTS")
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Returns true when the current environment cannot bind a localhost
/// socket, in which case wiremock-based tests are skipped.
#[track_caller]
#[must_use]
pub fn should_skip_socket_bound_test() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }

    let location = Location::caller();
    let message = format!(
        "[socket-bound-test] cannot bind localhost socket at {}:{}; wiremock-based test cannot run in this environment",
        location.file(),
        location.line()
    );
    if socket_tests_required() {
        panic!("{message}. Set LEGISFETCH_REQUIRE_SOCKET_TESTS=0 to allow local skip behavior.");
    }

    eprintln!(
        "{message}. Skipping test. Set LEGISFETCH_REQUIRE_SOCKET_TESTS=1 to fail-fast instead."
    );
    true
}

/// Starts a mock server, or returns `None` when sockets are unavailable.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if should_skip_socket_bound_test() {
        None
    } else {
        Some(MockServer::start().await)
    }
}

/// Builds a minimal structurally valid PDF for verifier tests.
#[must_use]
pub fn minimal_pdf() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"%PDF-1.4\n");
    bytes.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
    bytes.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n");
    bytes.extend_from_slice(b"3 0 obj\n<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>\nendobj\n");
    bytes.extend_from_slice(b"4 0 obj\n<< /Length 8 >>\nstream\nBT ET Tj\nendstream\nendobj\n");
    bytes.extend_from_slice(b"xref\n0 5\n");
    bytes.extend_from_slice(b"trailer\n<< /Size 5 /Root 1 0 R >>\n");
    bytes.extend_from_slice(b"startxref\n196\n%%EOF\n");
    bytes
}
