use std::io::{self, Write};

use apcam_shared::ErrorResponse;

pub const CORS_HEADER: &str = "Access-Control-Allow-Origin: *\r\n";

/// Headers that keep browsers and proxies from caching live images.
pub const NO_CACHE_HEADERS: &str = "Cache-Control: no-store, no-cache, must-revalidate, max-age=0\r\n\
                                    Pragma: no-cache\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

impl Response {
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.as_bytes().to_vec(),
            content_type: "text/plain",
        }
    }

    pub fn html(body: &str) -> Self {
        Self {
            status: 200,
            body: body.as_bytes().to_vec(),
            content_type: "text/html",
        }
    }

    pub fn json(body: String) -> Self {
        Self {
            status: 200,
            body: body.into_bytes(),
            content_type: "application/json",
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        let body = apcam_shared::to_json(&ErrorResponse::new(message))
            .unwrap_or_else(|_| String::from(r#"{"error":"internal"}"#));
        Self {
            status,
            body: body.into_bytes(),
            content_type: "application/json",
        }
    }
}

pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

pub fn write_response<W: Write>(stream: &mut W, response: &Response) -> io::Result<()> {
    write_body(stream, response.status, response.content_type, "", &response.body)
}

/// Writes a complete response from a borrowed body. `extra_headers` must be
/// empty or a run of CRLF-terminated header lines.
pub fn write_body<W: Write>(
    stream: &mut W,
    status: u16,
    content_type: &str,
    extra_headers: &str,
    body: &[u8],
) -> io::Result<()> {
    let header = format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: {}\r\n\
         Content-Length: {}\r\n\
         {}{}\
         Connection: close\r\n\
         \r\n",
        status,
        status_text(status),
        content_type,
        body.len(),
        CORS_HEADER,
        extra_headers
    );

    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()
}
