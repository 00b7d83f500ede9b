//! Presentation timestamp pacing.
//!
//! Decoders emit timestamps with holes and jitter: missing PTS, negative
//! best-effort estimates, out-of-order or corrupted values. `SyncClock`
//! repairs them into a monotonic-enough sequence plus an inter-frame delay
//! the host can pace against. Pure state machine, no I/O.

use crate::media::{rescale, RawFrame, TimeBase};

/// Inter-frame delays more than this multiple of the previous delay are
/// treated as timestamp corruption and smoothed over.
const DELAY_OUTLIER_FACTOR: i64 = 5;

#[derive(Debug, Clone)]
pub struct SyncClock {
    time_base: TimeBase,
    last_pts: i64,
    last_delay: i64,
}

impl SyncClock {
    pub fn new(time_base: TimeBase) -> Self {
        Self {
            time_base,
            last_pts: 0,
            last_delay: 0,
        }
    }

    /// Minimal PTS repair: unknown PTS falls back to the decoder's
    /// best-effort estimate, and a still-negative value falls back to the
    /// enclosing packet's timestamp.
    ///
    /// This is the only correction the seek catch-up loop applies; the
    /// delay-based smoothing below is reserved for normal playback.
    pub fn correct_pts(frame: &RawFrame, packet_pts: i64) -> i64 {
        let pts = frame.pts.unwrap_or(frame.best_effort_pts);
        if pts < 0 {
            packet_pts
        } else {
            pts
        }
    }

    /// Accept a corrected PTS, update clock state and return the inter-frame
    /// delay rescaled into microseconds.
    ///
    /// A non-positive delay, or one more than [`DELAY_OUTLIER_FACTOR`] times
    /// the previous nonzero delay, is replaced by the previous delay. The
    /// returned delay is therefore never negative.
    pub fn observe(&mut self, pts: i64) -> i64 {
        let mut delay = pts - self.last_pts;
        if delay <= 0 || (self.last_delay != 0 && delay > DELAY_OUTLIER_FACTOR * self.last_delay) {
            delay = self.last_delay;
        }
        self.last_pts = pts;
        self.last_delay = delay;
        rescale(delay, self.time_base, TimeBase::MICROSECONDS)
    }

    /// Last accepted PTS, stream time base units.
    pub fn last_pts(&self) -> i64 {
        self.last_pts
    }

    /// Last accepted inter-frame delay, stream time base units.
    pub fn last_delay(&self) -> i64 {
        self.last_delay
    }

    /// Half-frame tolerance window used by frame-accurate seeking to absorb
    /// timestamp granularity.
    pub fn half_frame_tolerance(&self) -> i64 {
        self.last_delay / 2
    }
}

// ============================================================================
// Tests
// ============================================================================
