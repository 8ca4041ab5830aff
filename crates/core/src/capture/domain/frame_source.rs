use crate::shared::frame::Frame;

/// Produces the most recent raw frame on demand.
///
/// A source never queues: each call returns a frame newer than the previous
/// one, blocking until it exists. `Ok(None)` means the stream has ended.
pub trait FrameSource: Send {
    fn current_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    /// Releases the device. Further calls to `current_frame` return `Ok(None)`.
    fn close(&mut self);

    /// Frames discarded so far because a newer one arrived before the
    /// pipeline asked.
    fn dropped_frames(&self) -> u64 {
        0
    }
}
