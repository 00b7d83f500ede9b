//! Single-slot frame mailbox between the decode path and the host.
//!
//! Exactly one frame can be "ready" at a time. The producer publishes under
//! a lock and then waits on a condvar until the consumer releases the slot;
//! the consumer side (`retrieve`/`release`) is always a fast lock-bounded
//! operation. Backpressure is expressed as producer stalling, never as
//! queuing.
//!
//! Buffer ownership: the slot owns the pixel buffer between frames. A new
//! publish reuses the previous allocation when the dimensions match and no
//! snapshot of it is still held; otherwise the old buffer is dropped and a
//! fresh one allocated. A held snapshot is therefore never mutated
//! underneath the consumer.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::media::{rescale, PixelFormat, TimeBase};

/// Metadata attached to a published frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameMeta {
    pub format: PixelFormat,
    pub pts: i64,
    pub delay_us: i64,
    pub dts: i64,
}

#[derive(Debug)]
pub(crate) struct SlotFrame {
    pub(crate) data: Vec<u8>,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) meta: FrameMeta,
}

struct SlotInner {
    ready: bool,
    draining: bool,
    frame: Option<Arc<SlotFrame>>,
}

pub struct FrameSlot {
    inner: Mutex<SlotInner>,
    released: Condvar,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                ready: false,
                draining: false,
                frame: None,
            }),
            released: Condvar::new(),
        }
    }

    /// Publish a frame, blocking while a previous frame is still marked
    /// ready. Returns `false` when the slot is draining for teardown and the
    /// frame was dropped instead.
    pub fn publish(&self, pixels: &[u8], width: u32, height: u32, meta: FrameMeta) -> bool {
        let mut inner = self.inner.lock();
        while inner.ready && !inner.draining {
            self.released.wait(&mut inner);
        }
        if inner.draining {
            tracing::debug!(pts = meta.pts, "slot draining, frame dropped");
            return false;
        }

        let reusable = inner.frame.take().and_then(|arc| Arc::try_unwrap(arc).ok());
        let mut data = match reusable {
            Some(old)
                if old.width == width && old.height == height && old.data.len() == pixels.len() =>
            {
                old.data
            }
            _ => vec![0u8; pixels.len()],
        };
        data.copy_from_slice(pixels);

        inner.frame = Some(Arc::new(SlotFrame {
            data,
            width,
            height,
            meta,
        }));
        inner.ready = true;
        true
    }

    /// Snapshot the current frame together with the readiness flag.
    ///
    /// Readiness is deliberately not required: retrieving while not ready
    /// returns the last published (possibly stale) frame, and callers check
    /// `is_ready` out-of-band.
    pub(crate) fn snapshot(&self) -> Option<(Arc<SlotFrame>, bool)> {
        let inner = self.inner.lock();
        inner.frame.clone().map(|frame| (frame, inner.ready))
    }

    /// Clear the ready flag, allowing the producer to publish the next frame.
    pub fn release(&self) {
        let mut inner = self.inner.lock();
        inner.ready = false;
        self.released.notify_one();
    }

    /// Whether an unread frame is waiting.
    pub fn is_ready(&self) -> bool {
        self.inner.lock().ready
    }

    /// Invalidate the slot for teardown: clears readiness, drops the held
    /// frame and wakes any blocked producer so disposal cannot deadlock.
    pub(crate) fn drain(&self) {
        let mut inner = self.inner.lock();
        inner.ready = false;
        inner.draining = true;
        inner.frame = None;
        self.released.notify_all();
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Ready Frame
// ============================================================================

/// Consumer-visible snapshot of a published frame.
///
/// All fields come from the same publish; the pixel buffer cannot change
/// while this snapshot is alive.
#[derive(Debug, Clone)]
pub struct ReadyFrame {
    frame: Arc<SlotFrame>,
    ready: bool,
    progress_ms: i64,
    dts_progress_ms: i64,
}

impl ReadyFrame {
    pub(crate) fn new(frame: Arc<SlotFrame>, ready: bool, time_base: TimeBase) -> Self {
        let progress_ms = rescale(frame.meta.pts, time_base, TimeBase::MILLISECONDS);
        let dts_progress_ms = rescale(frame.meta.dts, time_base, TimeBase::MILLISECONDS);
        Self {
            frame,
            ready,
            progress_ms,
            dts_progress_ms,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.frame.data
    }

    pub fn size(&self) -> usize {
        self.frame.data.len()
    }

    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    pub fn format(&self) -> PixelFormat {
        self.frame.meta.format
    }

    /// Presentation timestamp, stream time base units.
    pub fn pts(&self) -> i64 {
        self.frame.meta.pts
    }

    /// Inter-frame delay in microseconds.
    pub fn delay_us(&self) -> i64 {
        self.frame.meta.delay_us
    }

    /// Decode timestamp, stream time base units.
    pub fn dts(&self) -> i64 {
        self.frame.meta.dts
    }

    /// Presentation progress in milliseconds.
    pub fn progress_ms(&self) -> i64 {
        self.progress_ms
    }

    /// Decode progress in milliseconds.
    pub fn dts_progress_ms(&self) -> i64 {
        self.dts_progress_ms
    }

    /// Whether the slot was marked ready at retrieval time. False means the
    /// snapshot is a stale re-read of an already-released frame.
    pub fn is_ready(&self) -> bool {
        self.ready
    }
}

// ============================================================================
// Tests
// ============================================================================
