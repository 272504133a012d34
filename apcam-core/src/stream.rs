//! The per-connection MJPEG pull loop.

use core::mem;
use core::time::Duration;
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::encoder::JpegEncoder;
use crate::error::StreamError;
use crate::frame::Frame;
use crate::multipart::{Boundary, MultipartWriter};
use crate::sink::FrameSink;
use crate::source::FrameSource;

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub boundary: Boundary,
    /// Consecutive empty acquisitions before the session gives up.
    pub null_frame_limit: u8,
    /// Backoff after an empty acquisition.
    pub retry_delay: Duration,
    /// Pause after every delivered part.
    pub frame_yield: Duration,
    /// Stats are reported every this many frames. 0 disables them.
    pub stats_interval: u32,
    /// Quality handed to the encoder for non-JPEG frames.
    pub quality: u8,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            boundary: Boundary::default(),
            null_frame_limit: 5,
            retry_delay: Duration::from_millis(10),
            frame_yield: Duration::from_millis(1),
            stats_interval: 30,
            quality: 12,
        }
    }
}

/// Which buffer the current iteration still owns.
///
/// A JPEG frame is sent straight out of the driver buffer; anything else is
/// converted and the frame goes back before the part is written. Exactly one
/// of the two ever needs releasing.
enum Holding<F, B> {
    Frame(F),
    Buffer(B),
    Nothing,
}

impl<F: Frame, B: AsRef<[u8]>> Holding<F, B> {
    fn payload(&self) -> &[u8] {
        match self {
            Self::Frame(frame) => frame.data(),
            Self::Buffer(buf) => buf.as_ref(),
            Self::Nothing => &[],
        }
    }

    fn release<S: FrameSource<Frame = F>>(&mut self, source: &mut S) {
        match mem::replace(self, Self::Nothing) {
            Self::Frame(frame) => source.release(frame),
            Self::Buffer(buf) => drop(buf),
            Self::Nothing => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamStats {
    pub frames: u64,
    pub elapsed: Duration,
    pub fps: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client went away between parts.
    Disconnected,
    /// The response head could not be sent. Nothing was acquired.
    PreambleFailed,
    Failed(StreamError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionReport {
    pub frames: u64,
    pub elapsed: Duration,
    pub end: SessionEnd,
}

/// Receives best-effort session telemetry.
pub trait StreamObserver {
    fn on_stats(&mut self, _stats: &StreamStats) {}

    fn on_end(&mut self, _report: &SessionReport) {}
}

/// Forwards session telemetry to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl StreamObserver for LogObserver {
    fn on_stats(&mut self, stats: &StreamStats) {
        info!(
            "MJPEG: frames={} elapsed={}ms fps={:.1}",
            stats.frames,
            stats.elapsed.as_millis(),
            stats.fps
        );
    }

    fn on_end(&mut self, report: &SessionReport) {
        match report.end {
            SessionEnd::Failed(err) => {
                warn!("Stream aborted after {} frames: {}", report.frames, err)
            }
            end => info!("Stream ended after {} frames ({:?})", report.frames, end),
        }
    }
}

impl StreamObserver for () {}

struct StreamSession {
    frames: u64,
    started: Instant,
    null_frames: u8,
}

impl StreamSession {
    fn new() -> Self {
        Self {
            frames: 0,
            started: Instant::now(),
            null_frames: 0,
        }
    }

    fn stats(&self) -> StreamStats {
        let elapsed = self.started.elapsed();
        let secs = elapsed.as_secs_f32();
        StreamStats {
            frames: self.frames,
            elapsed,
            fps: if secs > 0.0 { self.frames as f32 / secs } else { 0.0 },
        }
    }

    fn finish(self, end: SessionEnd) -> SessionReport {
        SessionReport {
            frames: self.frames,
            elapsed: self.started.elapsed(),
            end,
        }
    }
}

pub struct Streamer {
    config: StreamConfig,
    writer: MultipartWriter,
}

impl Streamer {
    pub fn new(config: StreamConfig) -> Self {
        let writer = MultipartWriter::new(config.boundary.clone());
        Self { config, writer }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn writer(&self) -> &MultipartWriter {
        &self.writer
    }

    /// Streams parts into `sink` until it disconnects or the session fails.
    ///
    /// Every frame acquired from `source` is released exactly once and every
    /// encoder buffer is dropped exactly once, whatever the exit path.
    pub fn run<S, E, K, O>(
        &self,
        source: &mut S,
        encoder: &mut E,
        sink: &mut K,
        observer: &mut O,
    ) -> SessionReport
    where
        S: FrameSource,
        E: JpegEncoder,
        K: FrameSink,
        O: StreamObserver + ?Sized,
    {
        let session = StreamSession::new();
        if let Err(err) = sink.write_preamble(&self.writer.content_type()) {
            debug!("Stream preamble failed: {:?}", err);
            let report = session.finish(SessionEnd::PreambleFailed);
            observer.on_end(&report);
            return report;
        }

        let report = self.pump(session, source, encoder, sink, observer);
        observer.on_end(&report);
        report
    }

    fn pump<S, E, K, O>(
        &self,
        mut session: StreamSession,
        source: &mut S,
        encoder: &mut E,
        sink: &mut K,
        observer: &mut O,
    ) -> SessionReport
    where
        S: FrameSource,
        E: JpegEncoder,
        K: FrameSink,
        O: StreamObserver + ?Sized,
    {
        let limit = self.config.null_frame_limit.max(1);

        loop {
            if !sink.is_connected() {
                return session.finish(SessionEnd::Disconnected);
            }

            let Some(frame) = source.acquire() else {
                session.null_frames += 1;
                warn!("Camera frame is NULL ({}/{})", session.null_frames, limit);
                if session.null_frames >= limit {
                    error!("Too many NULL frames, aborting stream");
                    let attempts = session.null_frames;
                    return session
                        .finish(SessionEnd::Failed(StreamError::AcquireEmpty { attempts }));
                }
                pause(self.config.retry_delay);
                continue;
            };
            session.null_frames = 0;

            let mut held: Holding<S::Frame, E::Buffer> = if frame.format().is_jpeg() {
                Holding::Frame(frame)
            } else {
                let encoded = encoder.encode(&frame, self.config.quality);
                source.release(frame);
                match encoded {
                    Ok(buf) => Holding::Buffer(buf),
                    Err(err) => {
                        error!("JPEG compression failed: {}", err);
                        return session.finish(SessionEnd::Failed(StreamError::EncodeFailed));
                    }
                }
            };

            if !sink.is_connected() {
                held.release(source);
                return session.finish(SessionEnd::Disconnected);
            }

            let written = self.writer.write_part(sink, held.payload());
            held.release(source);
            if let Err(err) = written {
                let stage = err.stage();
                debug!("Part write failed at {}: {:?}", stage, err);
                return session.finish(SessionEnd::Failed(StreamError::WriteFailed { stage }));
            }

            session.frames += 1;
            let interval = self.config.stats_interval as u64;
            if interval > 0 && session.frames % interval == 0 {
                observer.on_stats(&session.stats());
            }

            pause(self.config.frame_yield);
        }
    }

    /// Takes one JPEG image and hands it to `deliver` while the underlying
    /// buffer is still held, then releases it.
    ///
    /// Empty acquisitions are retried with the same bound and backoff as a
    /// stream.
    pub fn snapshot<S, E, R>(
        &self,
        source: &mut S,
        encoder: &mut E,
        deliver: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, StreamError>
    where
        S: FrameSource,
        E: JpegEncoder,
    {
        let limit = self.config.null_frame_limit.max(1);
        let mut attempts = 0;
        let frame = loop {
            if let Some(frame) = source.acquire() {
                break frame;
            }
            attempts += 1;
            if attempts >= limit {
                return Err(StreamError::AcquireEmpty { attempts });
            }
            pause(self.config.retry_delay);
        };

        let mut held: Holding<S::Frame, E::Buffer> = if frame.format().is_jpeg() {
            Holding::Frame(frame)
        } else {
            let encoded = encoder.encode(&frame, self.config.quality);
            source.release(frame);
            Holding::Buffer(encoded.map_err(|_| StreamError::EncodeFailed)?)
        };

        let result = deliver(held.payload());
        held.release(source);
        Ok(result)
    }
}

impl Default for Streamer {
    fn default() -> Self {
        Self::new(StreamConfig::default())
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}
