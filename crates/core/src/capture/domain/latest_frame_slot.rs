use std::sync::{Condvar, Mutex, MutexGuard};

use crate::shared::frame::Frame;

#[derive(Default)]
struct SlotState {
    frame: Option<Frame>,
    published: u64,
    dropped: u64,
    closed: bool,
}

/// Single-frame handoff between a capture thread and the pipeline.
///
/// Publishing overwrites whatever the consumer has not picked up yet, so the
/// pipeline always sees the newest frame and never a backlog.
#[derive(Default)]
pub struct LatestFrameSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl LatestFrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores `frame`, replacing any frame not yet taken.
    pub fn publish(&self, frame: Frame) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        if state.frame.replace(frame).is_some() {
            state.dropped += 1;
        }
        state.published += 1;
        self.ready.notify_all();
    }

    /// Marks end of stream and wakes any waiting consumer.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.ready.notify_all();
    }

    /// Blocks until a frame is available and takes it.
    ///
    /// A frame published before `close` is still handed out; `None` only
    /// once the slot is both closed and empty.
    pub fn take(&self) -> Option<Frame> {
        let mut state = self.lock();
        loop {
            if let Some(frame) = state.frame.take() {
                return Some(frame);
            }
            if state.closed {
                return None;
            }
            state = self.ready.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Frames overwritten before the consumer took them.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    pub fn published(&self) -> u64 {
        self.lock().published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn frame(index: usize) -> Frame {
        Frame::new(vec![index as u8; 3], 1, 1, 3, index)
    }

    #[test]
    fn test_take_returns_published_frame() {
        let slot = LatestFrameSlot::new();
        slot.publish(frame(1));
        assert_eq!(slot.take().unwrap().index(), 1);
    }

    #[test]
    fn test_newer_frame_replaces_stale_one() {
        let slot = LatestFrameSlot::new();
        slot.publish(frame(1));
        slot.publish(frame(2));
        slot.publish(frame(3));

        assert_eq!(slot.take().unwrap().index(), 3);
        assert_eq!(slot.dropped(), 2);
        assert_eq!(slot.published(), 3);
    }

    #[test]
    fn test_taken_frame_is_not_returned_twice() {
        let slot = LatestFrameSlot::new();
        slot.publish(frame(1));
        slot.take();
        slot.close();
        assert!(slot.take().is_none());
        assert_eq!(slot.dropped(), 0);
    }

    #[test]
    fn test_close_drains_pending_then_ends() {
        let slot = LatestFrameSlot::new();
        slot.publish(frame(7));
        slot.close();

        assert_eq!(slot.take().unwrap().index(), 7);
        assert!(slot.take().is_none());
    }

    #[test]
    fn test_publish_after_close_is_ignored() {
        let slot = LatestFrameSlot::new();
        slot.close();
        slot.publish(frame(1));
        assert!(slot.take().is_none());
        assert_eq!(slot.published(), 0);
    }

    #[test]
    fn test_take_blocks_until_producer_publishes() {
        let slot = Arc::new(LatestFrameSlot::new());
        let producer = {
            let slot = slot.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                slot.publish(frame(5));
            })
        };

        assert_eq!(slot.take().unwrap().index(), 5);
        producer.join().unwrap();
    }

    #[test]
    fn test_close_wakes_blocked_consumer() {
        let slot = Arc::new(LatestFrameSlot::new());
        let closer = {
            let slot = slot.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                slot.close();
            })
        };

        assert!(slot.take().is_none());
        closer.join().unwrap();
    }
}
