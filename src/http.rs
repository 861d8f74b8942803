//! HTTP request/response values.
//!
//! This is the surface an HTTP layer would sit on; the echo server does not
//! use it. There is no parsing and no serialization here: a request is built
//! from parts plus the raw body bytes read off a connection, and a response
//! carries the bytes to be written back.

use bytes::Bytes;

/// HTTP version assumed when none is given.
pub const DEFAULT_VERSION: &str = "1.1";

/// Ordered header list with at most one entry per name.
///
/// Names compare ASCII case-insensitively and keep the spelling of their
/// first insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTable {
    headers: Vec<(String, String)>,
}

impl HeaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing the value in place if the name already exists.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self.position(name) {
            Some(idx) => self.headers[idx].1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.headers[idx].1.as_str())
    }

    /// Remove a header, returning its value if it was present.
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|idx| self.headers.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))
    }
}

/// An HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub uri: String,
    pub version: String,
    pub headers: HeaderTable,
    pub body: Option<Bytes>,
}

impl Request {
    pub fn new(method: &str, uri: &str) -> Self {
        Self {
            method: method.to_string(),
            uri: uri.to_string(),
            version: DEFAULT_VERSION.to_string(),
            headers: HeaderTable::new(),
            body: None,
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }
}

/// An HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderTable,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderTable::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }
}

/// Per-method request handling. Methods a handler does not implement yield
/// `None`.
pub trait RequestHandler {
    fn get(&self, _request: &Request) -> Option<Response> {
        None
    }

    fn post(&self, _request: &Request) -> Option<Response> {
        None
    }

    /// Dispatch on the request method (case-sensitive, as in HTTP).
    fn handle(&self, request: &Request) -> Option<Response> {
        match request.method.as_str() {
            "GET" => self.get(request),
            "POST" => self.post(request),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_header_replaces() {
        let mut headers = HeaderTable::new();
        headers.set_header("Content-Type", "text/plain");
        headers.set_header("Host", "localhost");
        headers.set_header("content-type", "text/html");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get_header("Content-Type"), Some("text/html"));
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec![("Content-Type", "text/html"), ("Host", "localhost")]
        );
    }

    #[test]
    fn test_get_missing_header() {
        let headers = HeaderTable::new();
        assert!(headers.is_empty());
        assert_eq!(headers.get_header("Host"), None);
    }

    #[test]
    fn test_remove_header() {
        let mut headers = HeaderTable::new();
        headers.set_header("Accept", "*/*");

        assert_eq!(headers.remove_header("ACCEPT"), Some("*/*".to_string()));
        assert_eq!(headers.remove_header("Accept"), None);
        assert!(headers.is_empty());
    }

    #[test]
    fn test_request_defaults() {
        let request = Request::new("GET", "/");
        assert_eq!(request.version, "1.1");
        assert!(request.body.is_none());

        let request = Request::new("POST", "/echo")
            .with_version("1.0")
            .with_body(Bytes::from_static(b"hello\n"));
        assert_eq!(request.version, "1.0");
        assert_eq!(request.body.as_deref(), Some(&b"hello\n"[..]));
    }

    struct Shout;

    impl RequestHandler for Shout {
        fn post(&self, request: &Request) -> Option<Response> {
            let body = request.body.clone().unwrap_or_default();
            Some(Response::new(200).with_body(crate::protocol::respond(&body).freeze()))
        }
    }

    #[test]
    fn test_handler_dispatch() {
        let request = Request::new("POST", "/").with_body(Bytes::from_static(b"hi\n"));
        let response = Shout.handle(&request).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(&response.body[..], b"HI\n");

        assert!(Shout.handle(&Request::new("GET", "/")).is_none());
        assert!(Shout.handle(&Request::new("DELETE", "/")).is_none());
    }
}
