//! Incremental reader for an HTTP/1.x request head.

use std::io::{self, BufRead, Read};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub target: String,
    pub version: String,
    headers: Vec<(String, String)>,
}

impl Request {
    /// Request target without the query string.
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or("")
    }

    /// First header with this name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn authorization(&self) -> Option<&str> {
        self.header("Authorization")
    }
}

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("connection closed before the request head was complete")]
    Closed,

    #[error("request head exceeds {0} bytes")]
    TooLarge(usize),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

/// Reads the request line and headers up to the blank line. Nothing past the
/// head is consumed. At most `max_bytes` are read in total.
pub fn read_request<R: BufRead>(reader: &mut R, max_bytes: usize) -> Result<Request, ReadError> {
    let mut consumed = 0usize;
    let mut request_line: Option<String> = None;
    let mut headers = Vec::new();

    loop {
        let remaining = max_bytes.saturating_sub(consumed);
        let mut raw = Vec::new();
        // one extra byte so an over-long line is distinguishable from a line that fits exactly
        let n = reader.by_ref().take(remaining as u64 + 1).read_until(b'\n', &mut raw)?;
        if n == 0 {
            return Err(ReadError::Closed);
        }
        consumed += n;
        if consumed > max_bytes {
            return Err(ReadError::TooLarge(max_bytes));
        }
        if !raw.ends_with(b"\n") {
            return Err(ReadError::Closed);
        }

        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches(['\r', '\n']);

        match request_line {
            None if line.is_empty() => continue,
            None => request_line = Some(line.to_string()),
            Some(_) if line.is_empty() => break,
            Some(_) => match parse_header(line) {
                Some(header) => headers.push(header),
                None => tracing::debug!("Ignoring unparseable header line {:?}", line),
            },
        }
    }

    let request_line = request_line.unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(t), Some(v), None) => (m, t, v),
        _ => return Err(ReadError::Malformed(format!("bad request line {:?}", request_line))),
    };

    if !method.bytes().all(is_tchar) {
        return Err(ReadError::Malformed(format!("bad method {:?}", method)));
    }
    if !version.starts_with("HTTP/") {
        return Err(ReadError::Malformed(format!("bad version {:?}", version)));
    }

    Ok(Request {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
        headers,
    })
}

/// RFC 7230 `tchar`: the characters allowed in a method or header name.
fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn parse_header(line: &str) -> Option<(String, String)> {
    let (name, value) = line.split_once(':')?;
    if name.is_empty() || !name.bytes().all(is_tchar) {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(raw: &str) -> Result<Request, ReadError> {
        read_request(&mut Cursor::new(raw.as_bytes().to_vec()), 4096)
    }

    #[test]
    fn parses_request_line_and_headers() {
        let req = parse(
            "GET /video_feed?x=1 HTTP/1.1\r\nHost: cam\r\nauthorization:  Basic YTpi \r\n\r\n",
        )
        .unwrap();

        assert_eq!(req.method, "GET");
        assert_eq!(req.target, "/video_feed?x=1");
        assert_eq!(req.path(), "/video_feed");
        assert_eq!(req.version, "HTTP/1.1");
        assert_eq!(req.header("HOST"), Some("cam"));
        assert_eq!(req.authorization(), Some("Basic YTpi"));
        assert_eq!(req.header("Cookie"), None);
    }

    #[test]
    fn leaves_body_unread() {
        let mut cursor = Cursor::new(b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\nbody".to_vec());
        let req = read_request(&mut cursor, 4096).unwrap();
        assert_eq!(req.method, "POST");

        let mut rest = String::new();
        cursor.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "body");
    }

    #[test]
    fn accepts_bare_newlines_and_leading_blank_lines() {
        let req = parse("\r\nGET / HTTP/1.0\nA: b\n\n").unwrap();
        assert_eq!(req.path(), "/");
        assert_eq!(req.header("a"), Some("b"));
    }

    #[test]
    fn headers_beyond_a_small_buffer_are_not_lost() {
        // long enough to overflow a 4 KiB single read
        let filler = "x".repeat(5000);
        let raw = format!(
            "GET / HTTP/1.1\r\nX-Filler: {}\r\nAuthorization: Basic YTpi\r\n\r\n",
            filler
        );
        let req = read_request(&mut Cursor::new(raw.into_bytes()), 16 * 1024).unwrap();
        assert_eq!(req.authorization(), Some("Basic YTpi"));
    }

    #[test]
    fn oversized_head_is_rejected() {
        let raw = format!("GET / HTTP/1.1\r\nX: {}\r\n\r\n", "y".repeat(600));
        let err = read_request(&mut Cursor::new(raw.into_bytes()), 256).unwrap_err();
        assert!(matches!(err, ReadError::TooLarge(256)));
    }

    #[test]
    fn truncated_or_empty_input_is_closed() {
        assert!(matches!(parse(""), Err(ReadError::Closed)));
        assert!(matches!(parse("GET / HTTP/1.1\r\nHost: a\r\n"), Err(ReadError::Closed)));
    }

    #[test]
    fn malformed_heads() {
        assert!(matches!(parse("GET /\r\n\r\n"), Err(ReadError::Malformed(_))));
        assert!(matches!(parse("G=T / HTTP/1.1\r\n\r\n"), Err(ReadError::Malformed(_))));
        assert!(matches!(parse("GET / FTP/1\r\n\r\n"), Err(ReadError::Malformed(_))));
    }

    #[test]
    fn token_methods_are_accepted() {
        let req = parse("M-SEARCH * HTTP/1.1\r\nHost: cam\r\n\r\n").unwrap();
        assert_eq!(req.method, "M-SEARCH");
        assert_eq!(parse("X_CUSTOM.1 / HTTP/1.1\r\n\r\n").unwrap().method, "X_CUSTOM.1");
    }

    #[test]
    fn odd_header_lines_are_skipped_not_fatal() {
        let req = parse(
            "GET / HTTP/1.1\r\nX-Odd-Line\r\nBad Name: v\r\nAuthorization: Basic YTpi\r\n\r\n",
        )
        .unwrap();
        assert_eq!(req.authorization(), Some("Basic YTpi"));
        assert_eq!(req.header("X-Odd-Line"), None);
        assert_eq!(req.header("Bad Name"), None);
    }
}
