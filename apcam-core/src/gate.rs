use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Admits one stream session at a time.
#[derive(Debug, Clone, Default)]
pub struct StreamGate {
    busy: Arc<AtomicBool>,
}

impl StreamGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another session holds the permit.
    pub fn try_enter(&self) -> Option<StreamPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| StreamPermit {
                busy: self.busy.clone(),
            })
    }

    pub fn is_streaming(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the life of a stream session; dropping it reopens the gate.
#[derive(Debug)]
pub struct StreamPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for StreamPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
