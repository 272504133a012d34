//! Thread-safe handle to the one camera, shared by every HTTP worker.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::config::{CameraConfig, MemoryStats};
use crate::control::{ControlOutcome, ControlRequest};
use crate::driver::CameraDriver;
use crate::error::LifecycleError;
use crate::lifecycle::{CameraController, CameraState, Lease};
use crate::sensor::SensorId;
use crate::source::FrameSource;

/// Result of a health probe plus the heap counters at that moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    pub ok: bool,
    pub memory: MemoryStats,
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraStatus {
    pub state: CameraState,
    pub ready: bool,
    pub config: CameraConfig,
    pub sensor_id: Option<SensorId>,
    pub last_error: Option<LifecycleError>,
    pub memory: MemoryStats,
}

struct Inner<D, T> {
    camera: Mutex<CameraController<D, T>>,
    released: Condvar,
}

/// Serializes every lifecycle, control and buffer operation behind one lock.
///
/// The lock is taken per operation, never for a whole stream session, so a
/// control request or reinit can interleave with a running stream.
pub struct SharedCamera<D, T> {
    inner: Arc<Inner<D, T>>,
}

impl<D, T> Clone for SharedCamera<D, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D, T> SharedCamera<D, T>
where
    D: CameraDriver,
    T: DelayNs,
{
    pub fn new(controller: CameraController<D, T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                camera: Mutex::new(controller),
                released: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CameraController<D, T>> {
        self.inner
            .camera
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the controller.
    pub fn with<R>(&self, f: impl FnOnce(&mut CameraController<D, T>) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn initialize(&self) -> Result<(), LifecycleError> {
        self.lock().initialize()
    }

    /// Stops new acquisitions, gives streams a bounded time to hand their
    /// frames back, then rebuilds the pipeline.
    ///
    /// If frames are still out when the wait expires the pipeline is left
    /// running as it was and `Busy` is returned.
    pub fn reinit(&self) -> Result<(), LifecycleError> {
        let mut camera = self.lock();
        let previous = camera.suspend();

        if camera.outstanding() > 0 {
            let timeout = camera.settings().drain_timeout;
            info!("Waiting for {} frames before reinit", camera.outstanding());
            let (guard, wait) = self
                .inner
                .released
                .wait_timeout_while(camera, timeout, |c| c.outstanding() > 0)
                .unwrap_or_else(PoisonError::into_inner);
            camera = guard;
            if wait.timed_out() && camera.outstanding() > 0 {
                let outstanding = camera.outstanding();
                warn!(
                    "{} frames still held after {}ms, reinit abandoned",
                    outstanding,
                    timeout.as_millis()
                );
                camera.resume(previous);
                return Err(LifecycleError::Busy { outstanding });
            }
        }

        camera.reinit()
    }

    pub fn probe(&self) -> bool {
        self.lock().probe()
    }

    pub fn health(&self) -> Health {
        let mut camera = self.lock();
        let ok = camera.probe();
        Health {
            ok,
            memory: camera.memory(),
        }
    }

    /// Parses and applies a `/control` request.
    pub fn set_control(&self, var: &str, val: &str) -> ControlOutcome {
        let outcome = match ControlRequest::parse(var, val) {
            Ok(request) => self.lock().apply_control(request),
            Err(rejection) => ControlOutcome::Rejected(rejection),
        };
        match outcome {
            ControlOutcome::Applied => info!("Control {}={} applied", var, val),
            ControlOutcome::Rejected(why) => warn!("Control {}={} rejected: {}", var, val, why),
        }
        outcome
    }

    pub fn status(&self) -> CameraStatus {
        let camera = self.lock();
        CameraStatus {
            state: camera.state(),
            ready: camera.is_ready(),
            config: camera.config().clone(),
            sensor_id: camera.sensor_id(),
            last_error: camera.last_error(),
            memory: camera.memory(),
        }
    }

    pub fn state(&self) -> CameraState {
        self.lock().state()
    }

    pub fn is_ready(&self) -> bool {
        self.lock().is_ready()
    }

    pub fn config(&self) -> CameraConfig {
        self.lock().config().clone()
    }

    pub fn quality(&self) -> u8 {
        self.lock().config().jpeg_quality
    }
}

impl<D, T> FrameSource for SharedCamera<D, T>
where
    D: CameraDriver,
    T: DelayNs,
{
    type Frame = Lease<D::Frame>;

    fn acquire(&mut self) -> Option<Self::Frame> {
        // wait out the driver's frame interval with the lock released
        let due = self.lock().next_frame_at();
        if let Some(wait) = due.and_then(|at| at.checked_duration_since(Instant::now())) {
            thread::sleep(wait);
        }
        self.lock().acquire()
    }

    fn release(&mut self, frame: Self::Frame) {
        self.lock().release(frame);
        self.inner.released.notify_all();
    }
}
