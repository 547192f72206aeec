//! Hand-off of completed video frames to a rendering thread.
//!
//! The emulation thread [`push`](FrameQueue::push)es every finished frame;
//! the render thread waits on the queue and always gets the newest one.
//! Frames pushed while the renderer is busy replace each other.

use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::debug;

use crate::video::VideoFrame;

struct Slot {
    frame: Option<VideoFrame>,
    running: bool,
    dropped: u64,
}

/// Single-producer, single-consumer queue of depth one.
pub struct FrameQueue {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                frame: None,
                running: true,
                dropped: 0,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // A panicking renderer cannot leave the slot half-written.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes `frame`, replacing any frame the consumer has not taken yet.
    pub fn push(&self, frame: VideoFrame) {
        let mut slot = self.lock();
        if slot.frame.replace(frame).is_some() {
            slot.dropped += 1;
        }
        self.ready.notify_one();
    }

    /// Blocks until a frame is available or the queue is closed. Returns
    /// `None` once closed, even if a frame was still pending.
    pub fn wait_frame(&self) -> Option<VideoFrame> {
        let mut slot = self.lock();
        loop {
            if !slot.running {
                return None;
            }
            if let Some(frame) = slot.frame.take() {
                return Some(frame);
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn try_take(&self) -> Option<VideoFrame> {
        self.lock().frame.take()
    }

    /// Frames overwritten before the consumer got to them.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Clears the running flag and wakes the consumer.
    pub fn close(&self) {
        self.lock().running = false;
        self.ready.notify_all();
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer thread draining a [`FrameQueue`].
pub struct RenderThread {
    queue: Arc<FrameQueue>,
    handle: Option<JoinHandle<u64>>,
}

impl RenderThread {
    /// Spawns a thread calling `render` for each frame it takes from `queue`.
    pub fn spawn<F>(queue: Arc<FrameQueue>, mut render: F) -> io::Result<Self>
    where
        F: FnMut(VideoFrame) + Send + 'static,
    {
        let consumer = Arc::clone(&queue);
        let handle = thread::Builder::new()
            .name("render".into())
            .spawn(move || {
                debug!("Render thread started");
                let mut rendered = 0u64;
                while let Some(frame) = consumer.wait_frame() {
                    render(frame);
                    rendered += 1;
                }
                debug!("Render thread stopped after {rendered} frames");
                rendered
            })?;
        Ok(Self {
            queue,
            handle: Some(handle),
        })
    }

    pub fn queue(&self) -> &Arc<FrameQueue> {
        &self.queue
    }

    /// Closes the queue and joins the thread. Returns the number of frames
    /// rendered, or `None` if the thread was already joined or panicked.
    pub fn shutdown(&mut self) -> Option<u64> {
        self.queue.close();
        let handle = self.handle.take()?;
        handle.join().ok()
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
