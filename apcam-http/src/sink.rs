use std::io::{self, ErrorKind, Write};
use std::net::TcpStream;

use apcam_core::FrameSink;

use crate::response::{status_text, CORS_HEADER, NO_CACHE_HEADERS};

/// Stream response body over a client socket.
pub struct TcpSink<'a> {
    stream: &'a mut TcpStream,
}

impl<'a> TcpSink<'a> {
    pub fn new(stream: &'a mut TcpStream) -> Self {
        Self { stream }
    }
}

impl FrameSink for TcpSink<'_> {
    type Error = io::Error;

    fn write_preamble(&mut self, content_type: &str) -> io::Result<()> {
        let head = format!(
            "HTTP/1.1 200 {}\r\n\
             Content-Type: {}\r\n\
             {}{}\
             Connection: close\r\n\
             \r\n",
            status_text(200),
            content_type,
            CORS_HEADER,
            NO_CACHE_HEADERS
        );
        self.stream.write_all(head.as_bytes())
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)
    }

    /// Peeks without blocking: EOF or a socket error means the client is gone.
    fn is_connected(&mut self) -> bool {
        if self.stream.set_nonblocking(true).is_err() {
            return false;
        }
        let mut probe = [0u8; 1];
        let connected = match self.stream.peek(&mut probe) {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::WouldBlock => true,
            Err(_) => false,
        };
        self.stream.set_nonblocking(false).is_ok() && connected
    }
}
