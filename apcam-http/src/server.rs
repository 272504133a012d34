use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use apcam_core::{
    CameraDriver, JpegEncoder, LogObserver, SharedCamera, StreamConfig, StreamGate,
    Streamer,
};
use apcam_shared::{HealthResponse, StatusResponse};
use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::request::HttpRequest;
use crate::response::{write_body, write_response, Response, NO_CACHE_HEADERS};
use crate::sink::TcpSink;

const INDEX_HTML: &str = include_str!("index.html");

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub stream: StreamConfig,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// Stack for each connection thread.
    pub worker_stack: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            worker_stack: 64 * 1024,
        }
    }
}

/// Routes requests for one camera. Cheap to clone; every connection thread
/// gets its own copy.
pub struct CameraServer<D, T, E> {
    camera: SharedCamera<D, T>,
    encoder: E,
    gate: StreamGate,
    config: ServerConfig,
}

impl<D, T, E: Clone> Clone for CameraServer<D, T, E> {
    fn clone(&self) -> Self {
        Self {
            camera: self.camera.clone(),
            encoder: self.encoder.clone(),
            gate: self.gate.clone(),
            config: self.config.clone(),
        }
    }
}

impl<D, T, E> CameraServer<D, T, E>
where
    D: CameraDriver + Send + 'static,
    T: DelayNs + Send + 'static,
    E: JpegEncoder + Clone + Send + 'static,
{
    pub fn new(camera: SharedCamera<D, T>, encoder: E, config: ServerConfig) -> Self {
        Self {
            camera,
            encoder,
            gate: StreamGate::new(),
            config,
        }
    }

    pub fn camera(&self) -> &SharedCamera<D, T> {
        &self.camera
    }

    pub fn gate(&self) -> &StreamGate {
        &self.gate
    }

    /// Binds `addr` and serves forever.
    pub fn run(self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr)?;
        self.serve(listener)
    }

    pub fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        listener.set_nonblocking(false)?;
        info!("HTTP server listening on {}", listener.local_addr()?);

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let server = self.clone();
                    let spawned = thread::Builder::new()
                        .name("http-conn".into())
                        .stack_size(self.config.worker_stack)
                        .spawn(move || {
                            if let Err(e) = server.handle_client(stream) {
                                debug!("Error handling client: {:?}", e);
                            }
                        });
                    if let Err(e) = spawned {
                        error!("Could not spawn connection thread: {:?}", e);
                    }
                }
                Err(e) => {
                    error!("Connection error: {:?}", e);
                }
            }
        }

        Ok(())
    }

    fn handle_client(&self, mut stream: TcpStream) -> anyhow::Result<()> {
        stream.set_read_timeout(Some(self.config.read_timeout))?;
        stream.set_write_timeout(Some(self.config.write_timeout))?;

        let mut buffer = [0u8; 2048];
        let bytes_read = stream.read(&mut buffer)?;

        if bytes_read == 0 {
            return Ok(());
        }

        let Some(request) = HttpRequest::parse(&buffer[..bytes_read]) else {
            let response = Response::error(400, "Bad request");
            write_response(&mut stream, &response)?;
            return Ok(());
        };
        debug!("Request: {} {}", request.method, request.path);

        match (request.method, request.path) {
            ("GET", "/") => write_response(&mut stream, &Response::html(INDEX_HTML))?,
            ("GET", "/stream") => self.handle_stream(stream)?,
            ("GET", "/jpg") => self.handle_jpg(&mut stream)?,
            ("GET", path) => {
                let response = self.route(path, &request);
                write_response(&mut stream, &response)?;
            }
            _ => {
                let response = Response::error(404, "Not found");
                write_response(&mut stream, &response)?;
            }
        }

        Ok(())
    }

    /// Handles every route whose answer is a small buffered response.
    pub fn route(&self, path: &str, request: &HttpRequest<'_>) -> Response {
        match path {
            "/control" => self.handle_control(request),
            "/health" => self.handle_health(),
            "/reinit" => self.handle_reinit(),
            "/status" => self.handle_status(),
            _ => Response::error(404, "Not found"),
        }
    }

    fn handle_stream(&self, mut stream: TcpStream) -> anyhow::Result<()> {
        let Some(_permit) = self.gate.try_enter() else {
            warn!("Stream requested while another client is streaming");
            write_response(&mut stream, &Response::error(503, "Stream busy"))?;
            return Ok(());
        };

        let peer = stream.peer_addr().ok();
        info!("Stream client connected: {:?}", peer);

        let mut config = self.config.stream.clone();
        config.quality = self.camera.quality();
        let streamer = Streamer::new(config);

        let mut source = self.camera.clone();
        let mut encoder = self.encoder.clone();
        let mut sink = TcpSink::new(&mut stream);
        streamer.run(&mut source, &mut encoder, &mut sink, &mut LogObserver);
        Ok(())
    }

    fn handle_jpg<W: Write>(&self, stream: &mut W) -> anyhow::Result<()> {
        let mut config = self.config.stream.clone();
        config.quality = self.camera.quality();
        let streamer = Streamer::new(config);

        let mut source = self.camera.clone();
        let mut encoder = self.encoder.clone();
        let sent = streamer.snapshot(&mut source, &mut encoder, |jpeg| {
            write_body(stream, 200, "image/jpeg", NO_CACHE_HEADERS, jpeg)
        });

        match sent {
            Ok(result) => result?,
            Err(err) => {
                error!("Snapshot failed: {}", err);
                write_response(stream, &Response::text(500, "Capture failed"))?;
            }
        }
        Ok(())
    }

    // Answers OK whether or not the value was taken
    fn handle_control(&self, request: &HttpRequest<'_>) -> Response {
        if request.query.is_none() {
            return Response::error(404, "Not found");
        }
        let var = request.query_param("var").unwrap_or("");
        let val = request.query_param("val").unwrap_or("");
        self.camera.set_control(var, val);
        Response::text(200, "OK")
    }

    fn handle_health(&self) -> Response {
        let health = self.camera.health();
        let body = HealthResponse {
            ok: health.ok,
            free_int: health.memory.free_internal as u64,
            free_psram: health.memory.free_psram as u64,
        };
        match apcam_shared::to_json(&body) {
            Ok(json) => Response::json(json),
            Err(_) => Response::error(500, "Serialization failed"),
        }
    }

    fn handle_reinit(&self) -> Response {
        match self.camera.reinit() {
            Ok(()) => Response::text(200, "Camera reinitialized"),
            Err(err) => {
                error!("Reinit failed: {}", err);
                Response::text(500, &format!("Reinit failed: {}", err))
            }
        }
    }

    fn handle_status(&self) -> Response {
        let status = self.camera.status();
        let body = StatusResponse {
            state: status.state.as_str().into(),
            ready: status.ready,
            framesize: status.config.frame_size.raw(),
            framesize_label: status.config.frame_size.to_string(),
            quality: status.config.jpeg_quality,
            xclk_hz: status.config.xclk_hz,
            fb_count: status.config.fb_count,
            streaming: self.gate.is_streaming(),
        };
        match apcam_shared::to_json(&body) {
            Ok(json) => Response::json(json),
            Err(_) => Response::error(500, "Serialization failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apcam_core::{CameraConfig, CameraController, FrameSize, LifecycleSettings, SimDriver};
    use apcam_core::SoftJpegEncoder;

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn server() -> CameraServer<SimDriver, NoDelay, SoftJpegEncoder> {
        let config = CameraConfig {
            frame_size: FrameSize::Qqvga,
            ..Default::default()
        };
        let controller =
            CameraController::new(SimDriver::new(), NoDelay, config, LifecycleSettings::default());
        let camera = SharedCamera::new(controller);
        camera.initialize().unwrap();
        CameraServer::new(camera, SoftJpegEncoder::new(), ServerConfig::default())
    }

    fn get<'a>(raw: &'a [u8]) -> HttpRequest<'a> {
        HttpRequest::parse(raw).unwrap()
    }

    #[test]
    fn test_control_without_query_is_404() {
        let server = server();
        let response = server.route("/control", &get(b"GET /control HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status, 404);
    }

    #[test]
    fn test_control_out_of_range_still_ok() {
        let server = server();
        let response = server.route(
            "/control",
            &get(b"GET /control?var=quality&val=64 HTTP/1.1\r\n\r\n"),
        );
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"OK");
        assert_eq!(server.camera().quality(), 12);

        server.route(
            "/control",
            &get(b"GET /control?var=quality&val=30 HTTP/1.1\r\n\r\n"),
        );
        assert_eq!(server.camera().quality(), 30);
    }

    #[test]
    fn test_status_json() {
        let server = server();
        let response = server.route("/status", &get(b"GET /status HTTP/1.1\r\n\r\n"));
        let status: StatusResponse = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(status.state, "ready");
        assert_eq!(status.framesize, FrameSize::Qqvga.raw());
        assert_eq!(status.framesize_label, "QQVGA(160x120)");
        assert!(!status.streaming);
    }

    #[test]
    fn test_unknown_route() {
        let server = server();
        let response = server.route("/nope", &get(b"GET /nope HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status, 404);
    }

    #[test]
    fn test_jpg_writes_exact_length() {
        let server = server();
        let mut out = Vec::new();
        server.handle_jpg(&mut out).unwrap();

        let split = out.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
        let head = String::from_utf8_lossy(&out[..split]).to_string();
        let body = &out[split..];
        assert!(head.contains("Content-Type: image/jpeg\r\n"));
        assert!(head.contains(&format!("Content-Length: {}\r\n", body.len())));
        assert_eq!(&body[..2], &[0xFF, 0xD8]);
    }
}
