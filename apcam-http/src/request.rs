/// The parts of an HTTP/1.1 request line the routes care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    /// Everything after `?`, if the target had one.
    pub query: Option<&'a str>,
}

impl<'a> HttpRequest<'a> {
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        let head_end = data
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .unwrap_or(data.len());
        let head = std::str::from_utf8(&data[..head_end]).ok()?;
        let request_line = head.lines().next()?;

        let mut parts = request_line.split_whitespace();
        let method = parts.next()?;
        let target = parts.next()?;

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        Some(HttpRequest {
            method,
            path,
            query,
        })
    }

    /// First value of `key` in the query string. Values are not
    /// percent-decoded.
    pub fn query_param(&self, key: &str) -> Option<&'a str> {
        self.query?
            .split('&')
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}
