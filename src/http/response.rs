//! Fixed responses.

pub const OK_BODY: &str = "<html><body><h1>Hello from flood-guard!</h1></body></html>";

/// The page served to every admitted request.
pub fn ok_response() -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        OK_BODY.len(),
        OK_BODY
    )
}
