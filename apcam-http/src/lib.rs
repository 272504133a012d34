//! Blocking HTTP/1.1 front end for a camera: index page, MJPEG stream,
//! snapshots, control and diagnostics.

pub mod request;
pub mod response;
pub mod server;
pub mod sink;

pub use request::HttpRequest;
pub use response::{write_response, Response};
pub use server::{CameraServer, ServerConfig};
pub use sink::TcpSink;
