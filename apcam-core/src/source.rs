use crate::frame::Frame;

/// Owner of the hardware frame-buffer pool.
///
/// `acquire` hands out one frame at a time; `None` means the pipeline had
/// nothing ready (empty or busy) and the caller may retry. Every acquired
/// frame must be passed back to `release` exactly once.
pub trait FrameSource {
    type Frame: Frame;

    fn acquire(&mut self) -> Option<Self::Frame>;

    fn release(&mut self, frame: Self::Frame);
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    type Frame = S::Frame;

    fn acquire(&mut self) -> Option<Self::Frame> {
        (**self).acquire()
    }

    fn release(&mut self, frame: Self::Frame) {
        (**self).release(frame)
    }
}
