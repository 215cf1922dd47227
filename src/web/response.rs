use std::io::{self, Write};

/// A complete, non-streaming HTTP/1.1 response. Always sent with
/// `Content-Length` and `Connection: close`.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    reason: &'static str,
    headers: Vec<(&'static str, String)>,
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, reason: &'static str) -> Self {
        Self { status, reason, headers: Vec::new(), body: Vec::new() }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Generic Basic challenge; never says why the credentials were refused.
    pub fn unauthorized(realm: &str) -> Self {
        Self::new(401, "Unauthorized")
            .header("WWW-Authenticate", format!("Basic realm=\"{}\"", realm))
    }

    pub fn html(body: String) -> Self {
        Self::new(200, "OK")
            .header("Content-Type", "text/html; charset=utf-8")
            .body(body)
    }

    pub fn bad_request() -> Self {
        Self::new(400, "Bad Request")
    }

    pub fn header_too_large() -> Self {
        Self::new(431, "Request Header Fields Too Large")
    }

    pub fn busy() -> Self {
        Self::new(503, "Service Unavailable").header("Retry-After", "1")
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, self.reason);
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        head.push_str("Connection: close\r\n\r\n");

        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.to_bytes())?;
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_has_challenge_and_empty_body() {
        let text = String::from_utf8(Response::unauthorized("RPi Security").to_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.1 401 Unauthorized\r\n"));
        assert!(text.contains("WWW-Authenticate: Basic realm=\"RPi Security\"\r\n"));
        assert!(text.contains("Content-Length: 0\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn content_length_counts_bytes_not_chars() {
        let body = "<h1>🔴</h1>".to_string();
        let len = body.len();
        let text = String::from_utf8(Response::html(body).to_bytes()).unwrap();
        assert!(text.contains(&format!("Content-Length: {}\r\n", len)));
        assert!(text.contains("Content-Type: text/html"));
        assert!(text.ends_with("<h1>🔴</h1>"));
    }

    #[test]
    fn busy_sets_retry_after() {
        let response = Response::busy();
        assert_eq!(response.status(), 503);
        let text = String::from_utf8(response.to_bytes()).unwrap();
        assert!(text.contains("Retry-After: 1\r\n"));
    }
}
